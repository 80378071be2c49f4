use std::time::Duration;

use lexcms_core::error::CoreError;

/// Quiet period after the last edit before an autosave fires.
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 2_000;

/// Editor session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    pub autosave_debounce: Duration,
    /// Disable to require explicit saves.
    pub autosave_enabled: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            autosave_enabled: true,
        }
    }
}

impl EditorConfig {
    /// Load settings from the process environment.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `LEXCMS_AUTOSAVE_DEBOUNCE_MS` | `2000`  |
    /// | `LEXCMS_AUTOSAVE`             | `true`  |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let debounce_ms = match lookup("LEXCMS_AUTOSAVE_DEBOUNCE_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CoreError::Validation(format!(
                    "LEXCMS_AUTOSAVE_DEBOUNCE_MS must be a number of milliseconds, got '{raw}'"
                ))
            })?,
            None => DEFAULT_AUTOSAVE_DEBOUNCE_MS,
        };

        let autosave_enabled = match lookup("LEXCMS_AUTOSAVE").map(|v| v.trim().to_ascii_lowercase()) {
            None => true,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(v) => {
                return Err(CoreError::Validation(format!(
                    "LEXCMS_AUTOSAVE must be true or false, got '{v}'"
                )))
            }
        };

        Ok(Self {
            autosave_debounce: Duration::from_millis(debounce_ms),
            autosave_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_two_second_debounce() {
        let config = EditorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.autosave_debounce, Duration::from_secs(2));
        assert!(config.autosave_enabled);
    }

    #[test]
    fn reads_overrides() {
        let config = EditorConfig::from_lookup(|name| match name {
            "LEXCMS_AUTOSAVE_DEBOUNCE_MS" => Some("500".into()),
            "LEXCMS_AUTOSAVE" => Some("off".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.autosave_debounce, Duration::from_millis(500));
        assert!(!config.autosave_enabled);
    }

    #[test]
    fn rejects_garbage() {
        assert!(EditorConfig::from_lookup(|_| Some("soon".into())).is_err());
    }
}
