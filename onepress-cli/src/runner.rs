//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading and logging initialization so command
//! handlers share one startup path.

use std::path::Path;

use tracing::info;

use onepress::config::ConfigFile;
use onepress::logging::{init_logging_full, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// When `config_path` is `None` the default location is used, falling
    /// back to built-in defaults if no file exists there.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Alternate config file, overriding the default path
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn with_options(
        config_path: Option<&Path>,
        debug_mode: bool,
    ) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)
                .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?,
            None => ConfigFile::load()?,
        };

        // Use log path from config
        let log_path = &config.logging.file;
        let log_dir = log_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "onepress.log".to_string());

        // Stdout logging would interleave with the interactive press loop,
        // so it is only enabled when stdout is redirected.
        let stdout_enabled = !atty::is(atty::Stream::Stdout);

        let logging_guard = init_logging_full(&log_dir, &log_file, stdout_enabled, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("OnePress v{}", onepress::VERSION);
        info!("OnePress CLI: {} command", command);
    }
}
