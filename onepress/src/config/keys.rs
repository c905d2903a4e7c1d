//! Configuration key access and validation.
//!
//! This module provides a type-safe interface for getting and setting
//! configuration values by key name, with validation via the Specification Pattern.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Coalescer settings
    CoalescerIdleWindowSecs,
    CoalescerProcessingWindowSecs,
    CoalescerAcceptWhileBusy,

    // Backend settings
    BackendsScriptPath,
    BackendsScriptTimeoutSecs,
    BackendsServiceCommand,
    BackendsServiceTimeoutSecs,
    BackendsDevicePaths,
    BackendsEnableDegraded,
    BackendsDegradedCountsAsSuccess,

    // State settings
    StateDirectory,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "coalescer.idle_window_secs" => Ok(ConfigKey::CoalescerIdleWindowSecs),
            "coalescer.processing_window_secs" => Ok(ConfigKey::CoalescerProcessingWindowSecs),
            "coalescer.accept_while_busy" => Ok(ConfigKey::CoalescerAcceptWhileBusy),

            "backends.script_path" => Ok(ConfigKey::BackendsScriptPath),
            "backends.script_timeout_secs" => Ok(ConfigKey::BackendsScriptTimeoutSecs),
            "backends.service_command" => Ok(ConfigKey::BackendsServiceCommand),
            "backends.service_timeout_secs" => Ok(ConfigKey::BackendsServiceTimeoutSecs),
            "backends.device_paths" => Ok(ConfigKey::BackendsDevicePaths),
            "backends.enable_degraded" => Ok(ConfigKey::BackendsEnableDegraded),
            "backends.degraded_counts_as_success" => {
                Ok(ConfigKey::BackendsDegradedCountsAsSuccess)
            }

            "state.directory" => Ok(ConfigKey::StateDirectory),

            "logging.file" => Ok(ConfigKey::LoggingFile),

            _ => Err(ConfigKeyError::UnknownKey(s.to_string())),
        }
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "coalescer.idle_window_secs").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::CoalescerIdleWindowSecs => "coalescer.idle_window_secs",
            ConfigKey::CoalescerProcessingWindowSecs => "coalescer.processing_window_secs",
            ConfigKey::CoalescerAcceptWhileBusy => "coalescer.accept_while_busy",
            ConfigKey::BackendsScriptPath => "backends.script_path",
            ConfigKey::BackendsScriptTimeoutSecs => "backends.script_timeout_secs",
            ConfigKey::BackendsServiceCommand => "backends.service_command",
            ConfigKey::BackendsServiceTimeoutSecs => "backends.service_timeout_secs",
            ConfigKey::BackendsDevicePaths => "backends.device_paths",
            ConfigKey::BackendsEnableDegraded => "backends.enable_degraded",
            ConfigKey::BackendsDegradedCountsAsSuccess => "backends.degraded_counts_as_success",
            ConfigKey::StateDirectory => "state.directory",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "coalescer").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "idle_window_secs").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::CoalescerIdleWindowSecs => config.coalescer.idle_window_secs.to_string(),
            ConfigKey::CoalescerProcessingWindowSecs => {
                config.coalescer.processing_window_secs.to_string()
            }
            ConfigKey::CoalescerAcceptWhileBusy => config.coalescer.accept_while_busy.to_string(),
            ConfigKey::BackendsScriptPath => config
                .backends
                .script_path
                .as_ref()
                .map(|p| path_to_display(p))
                .unwrap_or_default(),
            ConfigKey::BackendsScriptTimeoutSecs => {
                config.backends.script_timeout_secs.to_string()
            }
            ConfigKey::BackendsServiceCommand => config.backends.service_command.clone(),
            ConfigKey::BackendsServiceTimeoutSecs => {
                config.backends.service_timeout_secs.to_string()
            }
            ConfigKey::BackendsDevicePaths => config
                .backends
                .device_paths
                .iter()
                .map(|p| path_to_display(p))
                .collect::<Vec<_>>()
                .join(", "),
            ConfigKey::BackendsEnableDegraded => config.backends.enable_degraded.to_string(),
            ConfigKey::BackendsDegradedCountsAsSuccess => {
                config.backends.degraded_counts_as_success.to_string()
            }
            ConfigKey::StateDirectory => path_to_display(&config.state.directory),
            ConfigKey::LoggingFile => path_to_display(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        self.set_unchecked(config, value);
        Ok(())
    }

    /// Set the value without validation. Use `set()` for validated setting.
    fn set_unchecked(&self, config: &mut ConfigFile, value: &str) {
        match self {
            ConfigKey::CoalescerIdleWindowSecs => {
                // Validation ensures this won't panic
                config.coalescer.idle_window_secs = value.parse().unwrap();
            }
            ConfigKey::CoalescerProcessingWindowSecs => {
                config.coalescer.processing_window_secs = value.parse().unwrap();
            }
            ConfigKey::CoalescerAcceptWhileBusy => {
                let v = value.to_lowercase();
                config.coalescer.accept_while_busy =
                    v == "true" || v == "1" || v == "yes" || v == "on";
            }
            ConfigKey::BackendsScriptPath => {
                config.backends.script_path = optional_path(value);
            }
            ConfigKey::BackendsScriptTimeoutSecs => {
                config.backends.script_timeout_secs = value.parse().unwrap();
            }
            ConfigKey::BackendsServiceCommand => {
                config.backends.service_command = value.trim().to_string();
            }
            ConfigKey::BackendsServiceTimeoutSecs => {
                config.backends.service_timeout_secs = value.parse().unwrap();
            }
            ConfigKey::BackendsDevicePaths => {
                config.backends.device_paths = super::parser::parse_path_list(value);
            }
            ConfigKey::BackendsEnableDegraded => {
                let v = value.to_lowercase();
                config.backends.enable_degraded =
                    v == "true" || v == "1" || v == "yes" || v == "on";
            }
            ConfigKey::BackendsDegradedCountsAsSuccess => {
                let v = value.to_lowercase();
                config.backends.degraded_counts_as_success =
                    v == "true" || v == "1" || v == "yes" || v == "on";
            }
            ConfigKey::StateDirectory => {
                config.state.directory = expand_tilde(value);
            }
            ConfigKey::LoggingFile => {
                config.logging.file = expand_tilde(value);
            }
        }
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value)
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::CoalescerIdleWindowSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::CoalescerProcessingWindowSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::CoalescerAcceptWhileBusy => Box::new(BooleanSpec),
            ConfigKey::BackendsScriptPath => Box::new(OptionalPathSpec),
            ConfigKey::BackendsScriptTimeoutSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::BackendsServiceCommand => Box::new(AnyStringSpec),
            ConfigKey::BackendsServiceTimeoutSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::BackendsDevicePaths => Box::new(AnyStringSpec),
            ConfigKey::BackendsEnableDegraded => Box::new(BooleanSpec),
            ConfigKey::BackendsDegradedCountsAsSuccess => Box::new(BooleanSpec),
            ConfigKey::StateDirectory => Box::new(PathSpec),
            ConfigKey::LoggingFile => Box::new(PathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::CoalescerIdleWindowSecs,
            ConfigKey::CoalescerProcessingWindowSecs,
            ConfigKey::CoalescerAcceptWhileBusy,
            ConfigKey::BackendsScriptPath,
            ConfigKey::BackendsScriptTimeoutSecs,
            ConfigKey::BackendsServiceCommand,
            ConfigKey::BackendsServiceTimeoutSecs,
            ConfigKey::BackendsDevicePaths,
            ConfigKey::BackendsEnableDegraded,
            ConfigKey::BackendsDegradedCountsAsSuccess,
            ConfigKey::StateDirectory,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications (Specification Pattern)
// ============================================================================

/// Trait for value validation specifications.
trait ValueSpecification {
    /// Check if the value satisfies this specification.
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

/// Specification that accepts any string value.
struct AnyStringSpec;

impl ValueSpecification for AnyStringSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Specification for positive integer values.
struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| "must be a positive integer".to_string())
    }
}

/// Specification for boolean values.
struct BooleanSpec;

impl ValueSpecification for BooleanSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        let lower = value.to_lowercase();
        let valid = ["true", "false", "yes", "no", "1", "0", "on", "off"];
        if valid.contains(&lower.as_str()) {
            Ok(())
        } else {
            Err("must be true/false, yes/no, 1/0, or on/off".to_string())
        }
    }
}

/// Specification for path values (non-empty).
struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            Err("must be a valid path".to_string())
        } else {
            Ok(())
        }
    }
}

/// Specification for optional path values (empty allowed).
struct OptionalPathSpec;

impl ValueSpecification for OptionalPathSpec {
    fn is_satisfied_by(&self, _value: &str) -> Result<(), String> {
        // Empty is allowed for optional paths
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Expand ~ to home directory in paths.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Convert path to display string, collapsing home dir to ~.
fn path_to_display(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

/// Convert empty string to None, non-empty to Some path with tilde expansion.
fn optional_path(value: &str) -> Option<PathBuf> {
    if value.trim().is_empty() {
        None
    } else {
        Some(expand_tilde(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key_parsing() {
        assert_eq!(
            "coalescer.idle_window_secs".parse::<ConfigKey>().unwrap(),
            ConfigKey::CoalescerIdleWindowSecs
        );
        assert_eq!(
            "backends.script_path".parse::<ConfigKey>().unwrap(),
            ConfigKey::BackendsScriptPath
        );
        // Case insensitive
        assert_eq!(
            "COALESCER.IDLE_WINDOW_SECS".parse::<ConfigKey>().unwrap(),
            ConfigKey::CoalescerIdleWindowSecs
        );
        assert!("invalid.key".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_key_name_parts() {
        assert_eq!(ConfigKey::CoalescerIdleWindowSecs.section(), "coalescer");
        assert_eq!(
            ConfigKey::CoalescerIdleWindowSecs.key_name(),
            "idle_window_secs"
        );
        assert_eq!(ConfigKey::BackendsDevicePaths.section(), "backends");
        assert_eq!(ConfigKey::BackendsDevicePaths.key_name(), "device_paths");
    }

    #[test]
    fn test_get_value() {
        let config = ConfigFile::default();

        assert_eq!(ConfigKey::CoalescerIdleWindowSecs.get(&config), "3");
        assert_eq!(ConfigKey::CoalescerProcessingWindowSecs.get(&config), "30");
        assert_eq!(ConfigKey::CoalescerAcceptWhileBusy.get(&config), "true");
        assert_eq!(ConfigKey::BackendsScriptPath.get(&config), "");
        assert_eq!(ConfigKey::BackendsEnableDegraded.get(&config), "true");
    }

    #[test]
    fn test_set_value() {
        let mut config = ConfigFile::default();

        ConfigKey::CoalescerIdleWindowSecs
            .set(&mut config, "5")
            .unwrap();
        assert_eq!(config.coalescer.idle_window_secs, 5);

        ConfigKey::BackendsServiceCommand
            .set(&mut config, "lp -d office")
            .unwrap();
        assert_eq!(config.backends.service_command, "lp -d office");

        ConfigKey::CoalescerAcceptWhileBusy
            .set(&mut config, "off")
            .unwrap();
        assert!(!config.coalescer.accept_while_busy);
    }

    #[test]
    fn test_set_device_paths() {
        let mut config = ConfigFile::default();

        ConfigKey::BackendsDevicePaths
            .set(&mut config, "/dev/usb/lp1, /dev/lp2")
            .unwrap();
        assert_eq!(
            config.backends.device_paths,
            vec![PathBuf::from("/dev/usb/lp1"), PathBuf::from("/dev/lp2")]
        );
        assert_eq!(
            ConfigKey::BackendsDevicePaths.get(&config),
            "/dev/usb/lp1, /dev/lp2"
        );
    }

    #[test]
    fn test_validate_boolean() {
        for valid in &["true", "false", "yes", "no", "1", "0", "on", "off"] {
            assert!(
                ConfigKey::BackendsEnableDegraded.validate(valid).is_ok(),
                "Expected '{}' to be valid",
                valid
            );
        }
        assert!(ConfigKey::BackendsEnableDegraded.validate("maybe").is_err());
    }

    #[test]
    fn test_validate_positive_integer() {
        assert!(ConfigKey::BackendsScriptTimeoutSecs.validate("30").is_ok());
        assert!(ConfigKey::BackendsScriptTimeoutSecs.validate("0").is_ok());
        assert!(ConfigKey::BackendsScriptTimeoutSecs.validate("-1").is_err());
        assert!(ConfigKey::BackendsScriptTimeoutSecs.validate("abc").is_err());
    }

    #[test]
    fn test_set_invalid_value_fails() {
        let mut config = ConfigFile::default();

        let result = ConfigKey::CoalescerIdleWindowSecs.set(&mut config, "soon");
        assert!(result.is_err());

        // Config should be unchanged
        assert_eq!(config.coalescer.idle_window_secs, 3);
    }

    #[test]
    fn test_clear_optional_value() {
        let mut config = ConfigFile::default();

        // Set a value first
        ConfigKey::BackendsScriptPath
            .set(&mut config, "/opt/press/run.sh")
            .unwrap();
        assert!(config.backends.script_path.is_some());

        // Clear it
        ConfigKey::BackendsScriptPath.set(&mut config, "").unwrap();
        assert!(config.backends.script_path.is_none());
    }

    #[test]
    fn test_all_keys_round_trip() {
        for key in ConfigKey::all() {
            let parsed: ConfigKey = key.name().parse().unwrap();
            assert_eq!(parsed, *key);
        }
        assert_eq!(ConfigKey::all().len(), 12);
    }
}
