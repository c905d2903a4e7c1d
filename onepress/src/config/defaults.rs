//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, clamp helper functions,
//! and the `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::settings::*;

// =============================================================================
// Coalescer defaults
// =============================================================================

/// Default idle-window length in seconds.
pub const DEFAULT_IDLE_WINDOW_SECS: u64 = crate::coalescer::DEFAULT_IDLE_WINDOW.as_secs();

/// Default processing-window length in seconds.
pub const DEFAULT_PROCESSING_WINDOW_SECS: u64 =
    crate::coalescer::DEFAULT_PROCESSING_WINDOW.as_secs();

/// Maximum window length in seconds.
/// Beyond an hour a "window" is really a disabled trigger.
pub const MAX_WINDOW_SECS: u64 = 3600;

/// Clamps a coalescer window to its ceiling and logs a warning if clamped.
///
/// Zero is allowed: it turns the window off, so only still-queued jobs
/// absorb repeats.
pub(super) fn clamp_window_secs(key: &'static str, value: u64) -> u64 {
    if value > MAX_WINDOW_SECS {
        tracing::warn!(
            key,
            requested = value,
            max = MAX_WINDOW_SECS,
            "window above maximum, clamping to {}",
            MAX_WINDOW_SECS
        );
        MAX_WINDOW_SECS
    } else {
        value
    }
}

// =============================================================================
// Backend defaults
// =============================================================================

/// Default script invocation timeout in seconds.
pub const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = crate::backend::DEFAULT_SCRIPT_TIMEOUT.as_secs();

/// Default spooler submission timeout in seconds.
pub const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = crate::backend::DEFAULT_SERVICE_TIMEOUT.as_secs();

/// Minimum backend timeout in seconds.
/// Below this every attempt would be cut off before it could finish.
pub const MIN_BACKEND_TIMEOUT_SECS: u64 = 1;

/// Maximum backend timeout in seconds.
/// The sum of backend timeouts bounds worst-case job latency.
pub const MAX_BACKEND_TIMEOUT_SECS: u64 = 600;

/// Default spooler command for the service backend.
pub const DEFAULT_SERVICE_COMMAND: &str = "lp";

/// Default device node candidates for the raw device backend.
pub const DEFAULT_DEVICE_CANDIDATES: &[&str] = &["/dev/usb/lp0", "/dev/lp0"];

/// Default device candidate list as paths.
pub fn default_device_paths() -> Vec<PathBuf> {
    DEFAULT_DEVICE_CANDIDATES.iter().map(PathBuf::from).collect()
}

/// Clamps a backend timeout to valid range and logs a warning if clamped.
pub(super) fn clamp_timeout_secs(key: &'static str, value: u64) -> u64 {
    if value < MIN_BACKEND_TIMEOUT_SECS {
        tracing::warn!(
            key,
            requested = value,
            min = MIN_BACKEND_TIMEOUT_SECS,
            max = MAX_BACKEND_TIMEOUT_SECS,
            "timeout below minimum, clamping to {}",
            MIN_BACKEND_TIMEOUT_SECS
        );
        MIN_BACKEND_TIMEOUT_SECS
    } else if value > MAX_BACKEND_TIMEOUT_SECS {
        tracing::warn!(
            key,
            requested = value,
            min = MIN_BACKEND_TIMEOUT_SECS,
            max = MAX_BACKEND_TIMEOUT_SECS,
            "timeout above maximum, clamping to {}",
            MAX_BACKEND_TIMEOUT_SECS
        );
        MAX_BACKEND_TIMEOUT_SECS
    } else {
        value
    }
}

// =============================================================================
// Logging defaults
// =============================================================================

/// Default log file name inside the config directory.
pub const LOG_FILE_NAME: &str = "onepress.log";

// =============================================================================
// ConfigFile::default()
// =============================================================================

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            coalescer: CoalescerSettings {
                idle_window_secs: DEFAULT_IDLE_WINDOW_SECS,
                processing_window_secs: DEFAULT_PROCESSING_WINDOW_SECS,
                accept_while_busy: true,
            },
            backends: BackendSettings {
                script_path: None,
                script_timeout_secs: DEFAULT_SCRIPT_TIMEOUT_SECS,
                service_command: DEFAULT_SERVICE_COMMAND.to_string(),
                service_timeout_secs: DEFAULT_SERVICE_TIMEOUT_SECS,
                device_paths: default_device_paths(),
                enable_degraded: true,
                degraded_counts_as_success: true,
            },
            state: StateSettings {
                directory: config_dir.clone(),
            },
            logging: LoggingSettings {
                file: config_dir.join(LOG_FILE_NAME),
            },
        }
    }
}
