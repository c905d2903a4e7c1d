//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::defaults::{clamp_timeout_secs, clamp_window_secs};
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [coalescer] section
    if let Some(section) = ini.section(Some("coalescer")) {
        if let Some(v) = section.get("idle_window_secs") {
            let parsed: u64 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "coalescer".to_string(),
                key: "idle_window_secs".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (seconds)".to_string(),
            })?;
            config.coalescer.idle_window_secs =
                clamp_window_secs("coalescer.idle_window_secs", parsed);
        }
        if let Some(v) = section.get("processing_window_secs") {
            let parsed: u64 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "coalescer".to_string(),
                key: "processing_window_secs".to_string(),
                value: v.to_string(),
                reason: "must be a non-negative integer (seconds)".to_string(),
            })?;
            config.coalescer.processing_window_secs =
                clamp_window_secs("coalescer.processing_window_secs", parsed);
        }
        if let Some(v) = section.get("accept_while_busy") {
            config.coalescer.accept_while_busy = parse_bool(v);
        }
    }

    // The processing window subsumes the idle window: a job still absorbs
    // repeats at least as long while running as it would at rest.
    if config.coalescer.processing_window_secs < config.coalescer.idle_window_secs {
        tracing::warn!(
            idle = config.coalescer.idle_window_secs,
            processing = config.coalescer.processing_window_secs,
            "processing_window_secs below idle_window_secs, raising it to match"
        );
        config.coalescer.processing_window_secs = config.coalescer.idle_window_secs;
    }

    // [backends] section
    if let Some(section) = ini.section(Some("backends")) {
        if let Some(v) = section.get("script_path") {
            let v = v.trim();
            if !v.is_empty() {
                config.backends.script_path = Some(expand_tilde(v));
            } else {
                config.backends.script_path = None;
            }
        }
        if let Some(v) = section.get("script_timeout_secs") {
            let parsed: u64 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "backends".to_string(),
                key: "script_timeout_secs".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer (seconds)".to_string(),
            })?;
            config.backends.script_timeout_secs =
                clamp_timeout_secs("backends.script_timeout_secs", parsed);
        }
        if let Some(v) = section.get("service_command") {
            // Empty disables the service backend.
            config.backends.service_command = v.trim().to_string();
        }
        if let Some(v) = section.get("service_timeout_secs") {
            let parsed: u64 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "backends".to_string(),
                key: "service_timeout_secs".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer (seconds)".to_string(),
            })?;
            config.backends.service_timeout_secs =
                clamp_timeout_secs("backends.service_timeout_secs", parsed);
        }
        if let Some(v) = section.get("device_paths") {
            config.backends.device_paths = parse_path_list(v);
        }
        if let Some(v) = section.get("enable_degraded") {
            config.backends.enable_degraded = parse_bool(v);
        }
        if let Some(v) = section.get("degraded_counts_as_success") {
            config.backends.degraded_counts_as_success = parse_bool(v);
        }
    }

    // [state] section
    if let Some(section) = ini.section(Some("state")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.state.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Parse a comma-separated list of paths, skipping empty entries.
pub(super) fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(expand_tilde)
        .collect()
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use crate::config::settings::ConfigFile;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        // Only specify some settings, rest should use defaults
        std::fs::write(
            &config_path,
            r#"
[coalescer]
idle_window_secs = 5

[backends]
script_path = /usr/local/bin/press.sh
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();

        // Specified values
        assert_eq!(config.coalescer.idle_window_secs, 5);
        assert_eq!(
            config.backends.script_path,
            Some(PathBuf::from("/usr/local/bin/press.sh"))
        );

        // Default values
        assert_eq!(
            config.coalescer.processing_window_secs,
            DEFAULT_PROCESSING_WINDOW_SECS
        );
        assert_eq!(config.backends.service_command, DEFAULT_SERVICE_COMMAND);
    }

    #[test]
    fn test_invalid_window_value() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[coalescer]
idle_window_secs = soon
"#,
        )
        .unwrap();

        let result = ConfigFile::load_from(&config_path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("idle_window_secs"));
    }

    #[test]
    fn test_window_clamped_to_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[coalescer]
processing_window_secs = 999999
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.coalescer.processing_window_secs, MAX_WINDOW_SECS);
    }

    #[test]
    fn test_processing_window_raised_to_idle_window() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[coalescer]
idle_window_secs = 10
processing_window_secs = 2
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.coalescer.processing_window_secs, 10);
    }

    #[test]
    fn test_timeout_clamped_to_floor() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[backends]
script_timeout_secs = 0
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.backends.script_timeout_secs, MIN_BACKEND_TIMEOUT_SECS);
    }

    #[test]
    fn test_device_path_list() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[backends]
device_paths = /dev/usb/lp1, /dev/lp3,
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(
            config.backends.device_paths,
            vec![PathBuf::from("/dev/usb/lp1"), PathBuf::from("/dev/lp3")]
        );
    }

    #[test]
    fn test_empty_service_command_disables_backend() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        std::fs::write(
            &config_path,
            r#"
[backends]
service_command =
"#,
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert!(config.backends.service_command.is_empty());
    }

    #[test]
    fn test_parse_bool_true_values() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("1"));
        assert!(parse_bool("on"));
        assert!(parse_bool("  true  "));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert!(!parse_bool("false"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
        // Invalid values also return false
        assert!(!parse_bool("invalid"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_expand_tilde() {
        let path = expand_tilde("~/test/path");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path, home.join("test/path"));
        }

        // Non-tilde paths should be unchanged
        let path = expand_tilde("/absolute/path");
        assert_eq!(path, PathBuf::from("/absolute/path"));
    }
}
