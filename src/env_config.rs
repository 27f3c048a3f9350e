//! Centralized environment-variable parsing helpers.
//!
//! Feature-toggle env-var reads go through these helpers so the
//! truthy/falsey parsing lives in exactly one place.

/// Returns `true` when the environment variable is set to a truthy value
/// (`1`, `true`, `yes`, or `on`, case-insensitive, trimmed).
#[inline]
pub(crate) fn env_var_truthy(var_name: &str) -> bool {
    std::env::var(var_name)
        .map(|raw| is_truthy(&raw))
        .unwrap_or(false)
}

#[inline]
fn is_truthy(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

/// Declares a cached boolean feature flag backed by a `OnceLock<bool>`.
///
/// `enabled_when(fn_name, "ENV_VAR")` — `true` only when the env var is
/// truthy (off by default, enabled by the env var).
macro_rules! define_env_flag {
    (enabled_when($fn_name:ident, $var:expr)) => {
        #[inline]
        pub(crate) fn $fn_name() -> bool {
            static VALUE: ::std::sync::OnceLock<bool> = ::std::sync::OnceLock::new();
            *VALUE.get_or_init(|| $crate::env_config::env_var_truthy($var))
        }
    };
}

pub(crate) use define_env_flag;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values_parse_case_insensitively() {
        for value in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(is_truthy(value), "{value:?} should be truthy");
        }
    }

    #[test]
    fn everything_else_is_falsey() {
        for value in ["0", "false", "off", "", "2", "enabled"] {
            assert!(!is_truthy(value), "{value:?} should be falsey");
        }
    }

    #[test]
    fn unset_variables_are_falsey() {
        assert!(!env_var_truthy("RIME_CAPTURE_TEST_VAR_THAT_IS_NEVER_SET"));
    }
}
