mod logging;
mod scheduler;
mod scripthost;
mod settings;

pub use logging::*;
pub use scheduler::*;
pub use scripthost::*;
pub use settings::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub scripthost: ScriptHostConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.settings.tz.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "settings.tz".into(),
                message: "timezone must not be empty".into(),
            });
        } else if self.settings.tz.parse::<chrono_tz::Tz>().is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "settings.tz".into(),
                message: format!("\"{}\" is not a recognized IANA timezone", self.settings.tz),
            });
        }

        if !self.settings.latitude.is_finite() || self.settings.latitude.abs() > 90.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "settings.latitude".into(),
                message: format!("latitude {} out of range [-90, 90]", self.settings.latitude),
            });
        }

        if !self.settings.longitude.is_finite() || self.settings.longitude.abs() > 180.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "settings.longitude".into(),
                message: format!("longitude {} out of range [-180, 180]", self.settings.longitude),
            });
        }

        if self.scheduler.tick_interval_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "scheduler.tick_interval_secs".into(),
                message: "tick_interval_secs must be greater than 0".into(),
            });
        }

        if self.scheduler.tick_interval_secs > 60 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "scheduler.tick_interval_secs".into(),
                message: "tick interval above 60s may miss minute boundaries".into(),
            });
        }

        if !self.scripthost.scripts_dir.as_os_str().is_empty()
            && !self.scripthost.scripts_dir.exists()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "scripthost.scripts_dir".into(),
                message: format!(
                    "{} does not exist yet",
                    self.scripthost.scripts_dir.display()
                ),
            });
        }

        if self.scripthost.bridge_timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "scripthost.bridge_timeout_secs".into(),
                message: "bridge_timeout_secs must be greater than 0".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_passes() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn empty_tz_is_error() {
        let mut cfg = Config::default();
        cfg.settings.tz = String::new();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "settings.tz").expect("expected tz error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn garbage_tz_is_error() {
        let mut cfg = Config::default();
        cfg.settings.tz = "Not/A/Zone".into();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "settings.tz").expect("expected tz error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn latitude_out_of_range_is_error() {
        let mut cfg = Config::default();
        cfg.settings.latitude = 120.0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "settings.latitude").expect("expected latitude error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn zero_tick_interval_is_error() {
        let mut cfg = Config::default();
        cfg.scheduler.tick_interval_secs = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "scheduler.tick_interval_secs")
            .expect("expected tick interval error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "settings.tz".into(),
            message: "timezone must not be empty".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] settings.tz: timezone must not be empty"
        );
    }
}
