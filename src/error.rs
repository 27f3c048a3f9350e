use std::fmt;

#[derive(Debug)]
pub enum CaptureError {
    InvalidTarget(String),

    MonitorLost,

    AccessLost,

    BackendUnavailable(String),

    BufferOverflow,

    Platform(anyhow::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureErrorClass {
    InvalidInput,
    Unsupported,
    Transient,
    Fatal,
}

impl CaptureError {
    pub fn class(&self) -> CaptureErrorClass {
        match self {
            Self::InvalidTarget(_) => CaptureErrorClass::InvalidInput,
            Self::BackendUnavailable(_) => CaptureErrorClass::Unsupported,
            Self::MonitorLost | Self::AccessLost => CaptureErrorClass::Transient,
            Self::BufferOverflow | Self::Platform(_) => CaptureErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), CaptureErrorClass::Transient)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTarget(target) => {
                write!(f, "requested capture target is not available: {target}")
            }
            Self::MonitorLost => write!(f, "requested monitor is no longer available"),
            Self::AccessLost => write!(f, "capture access lost"),
            Self::BackendUnavailable(message) => {
                write!(f, "capture backend is unavailable: {message}")
            }
            Self::BufferOverflow => write!(f, "frame buffer size overflow"),
            Self::Platform(inner) => write!(f, "{inner}"),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Platform(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes_follow_failure_taxonomy() {
        assert_eq!(
            CaptureError::InvalidTarget("monitor 7".into()).class(),
            CaptureErrorClass::InvalidInput
        );
        assert_eq!(
            CaptureError::BackendUnavailable("no wgc".into()).class(),
            CaptureErrorClass::Unsupported
        );
        assert_eq!(CaptureError::MonitorLost.class(), CaptureErrorClass::Transient);
        assert_eq!(CaptureError::AccessLost.class(), CaptureErrorClass::Transient);
        assert_eq!(CaptureError::BufferOverflow.class(), CaptureErrorClass::Fatal);
        assert_eq!(
            CaptureError::Platform(anyhow::anyhow!("boom")).class(),
            CaptureErrorClass::Fatal
        );
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(CaptureError::AccessLost.is_retryable());
        assert!(CaptureError::MonitorLost.is_retryable());
        assert!(!CaptureError::BufferOverflow.is_retryable());
        assert!(!CaptureError::InvalidTarget("x".into()).is_retryable());
    }

    #[test]
    fn platform_errors_preserve_the_source_chain() {
        let error = CaptureError::Platform(anyhow::anyhow!("CreateTexture2D failed"));
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("CreateTexture2D"));
    }
}
