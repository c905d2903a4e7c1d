//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::coalescer::CoalescerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Coalescer window settings
    pub coalescer: CoalescerSettings,
    /// Output backend settings
    pub backends: BackendSettings,
    /// State persistence settings
    pub state: StateSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Coalescer configuration.
#[derive(Debug, Clone)]
pub struct CoalescerSettings {
    /// Debounce window in seconds while the worker is idle.
    /// Triggers this close to the last emitted job merge into it.
    /// Default: 3 seconds.
    pub idle_window_secs: u64,
    /// Absorption window in seconds while a job is processing.
    /// Re-presses within this window of the last emission merge into the
    /// in-flight job. Default: 30 seconds.
    pub processing_window_secs: u64,
    /// Whether a trigger past the processing window queues a new job
    /// (true) or keeps merging into the in-flight one (false).
    /// Default: true.
    pub accept_while_busy: bool,
}

impl From<&CoalescerSettings> for CoalescerConfig {
    fn from(settings: &CoalescerSettings) -> Self {
        Self {
            idle_window: Duration::from_secs(settings.idle_window_secs),
            processing_window: Duration::from_secs(settings.processing_window_secs),
            accept_while_busy: settings.accept_while_busy,
        }
    }
}

/// Output backend configuration.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Executable invoked by the script backend (None = backend disabled).
    pub script_path: Option<PathBuf>,
    /// Timeout in seconds for one script invocation.
    /// Default: 30 seconds.
    pub script_timeout_secs: u64,
    /// Spooler command line for the service backend, split on whitespace.
    /// Empty disables the backend. Default: "lp".
    pub service_command: String,
    /// Timeout in seconds for one spooler submission.
    /// Default: 20 seconds.
    pub service_timeout_secs: u64,
    /// Ordered device node candidates for the raw device backend.
    /// The first existing path is written to.
    pub device_paths: Vec<PathBuf>,
    /// Whether the always-succeeds degraded backend terminates the chain.
    /// Disabling it means a job can fail outright when all hardware is
    /// gone. Default: true.
    pub enable_degraded: bool,
    /// Whether a degraded outcome counts toward the success counter.
    /// The outcome itself is flagged degraded either way.
    /// Default: true.
    pub degraded_counts_as_success: bool,
}

/// State persistence configuration.
#[derive(Debug, Clone)]
pub struct StateSettings {
    /// Directory holding the persisted state file.
    /// Default: ~/.onepress
    pub directory: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
