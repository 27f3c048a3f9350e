use std::fmt;

/// Identifies one attached monitor.
///
/// The raw handle is the native `HMONITOR` value. Handles are only stable
/// while the display configuration is unchanged; re-enumerate after a
/// resolution or topology change.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MonitorId {
    handle: isize,

    name: String,

    is_primary: bool,
}

impl MonitorId {
    pub fn from_parts(raw_handle: isize, name: impl Into<String>, is_primary: bool) -> Self {
        Self {
            handle: raw_handle,
            name: name.into(),
            is_primary,
        }
    }

    pub fn raw_handle(&self) -> isize {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Enumerate monitors attached to the desktop, in adapter/output order.
#[cfg(target_os = "windows")]
pub fn enumerate_monitors() -> crate::error::CaptureResult<Vec<MonitorId>> {
    crate::platform::windows::monitor::enumerate()
}

#[cfg(target_os = "windows")]
pub fn primary_monitor() -> crate::error::CaptureResult<MonitorId> {
    use crate::error::CaptureError;
    enumerate_monitors()?
        .into_iter()
        .find(|monitor| monitor.is_primary())
        .ok_or_else(|| CaptureError::InvalidTarget("no primary monitor found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_id_displays_its_device_name() {
        let monitor = MonitorId::from_parts(0x1234, r"\\.\DISPLAY1", true);
        assert_eq!(monitor.to_string(), r"\\.\DISPLAY1");
        assert_eq!(monitor.raw_handle(), 0x1234);
        assert!(monitor.is_primary());
    }
}
