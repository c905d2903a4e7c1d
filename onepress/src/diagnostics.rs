//! System diagnostics for bug reports and troubleshooting.
//!
//! This module provides functionality to collect system information
//! that is useful for debugging issues with OnePress.
//!
//! # Example
//!
//! ```ignore
//! use onepress::diagnostics::SystemReport;
//!
//! let report = SystemReport::collect();
//! println!("{}", report);
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::config::{config_file_path, ConfigFile};
use crate::persist::STATE_FILE_NAME;

/// A comprehensive system diagnostics report.
#[derive(Debug, Clone)]
pub struct SystemReport {
    /// OnePress version
    pub onepress_version: String,
    /// Operating system information
    pub os: OsInfo,
    /// Print spooler visibility
    pub spooler: SpoolerInfo,
    /// Configured device node presence
    pub devices: DeviceInfo,
    /// State directory health
    pub state: StateInfo,
    /// OnePress configuration (with secrets redacted)
    pub config: ConfigInfo,
}

/// Operating system information.
#[derive(Debug, Clone, Default)]
pub struct OsInfo {
    pub kernel: Option<String>,
    pub os_name: Option<String>,
}

/// Print spooler visibility.
#[derive(Debug, Clone, Default)]
pub struct SpoolerInfo {
    pub program: Option<String>,
    pub resolved: Option<String>,
    pub scheduler: Option<String>,
}

/// Presence of each configured device node candidate.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub candidates: Vec<(String, bool)>,
}

/// State directory health.
#[derive(Debug, Clone, Default)]
pub struct StateInfo {
    pub directory: Option<String>,
    pub writable: bool,
    pub state_file_exists: bool,
}

/// OnePress configuration (secrets redacted).
#[derive(Debug, Clone, Default)]
pub struct ConfigInfo {
    pub config_path: Option<String>,
    pub config_contents: Option<String>,
}

impl SystemReport {
    /// Collect system diagnostics using the on-disk configuration.
    pub fn collect() -> Self {
        let config = ConfigFile::load().unwrap_or_default();
        Self::collect_with(&config)
    }

    /// Collect system diagnostics against an already loaded configuration.
    pub fn collect_with(config: &ConfigFile) -> Self {
        Self {
            onepress_version: crate::VERSION.to_string(),
            os: OsInfo::collect(),
            spooler: SpoolerInfo::collect(&config.backends.service_command),
            devices: DeviceInfo::collect(&config.backends.device_paths),
            state: StateInfo::collect(&config.state.directory),
            config: ConfigInfo::collect(),
        }
    }
}

impl OsInfo {
    fn collect() -> Self {
        let mut info = Self::default();

        // Kernel version
        if let Ok(output) = Command::new("uname").arg("-r").output() {
            if output.status.success() {
                info.kernel = Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }

        // OS Release
        if let Ok(content) = fs::read_to_string("/etc/os-release") {
            for line in content.lines() {
                if line.starts_with("PRETTY_NAME=") {
                    info.os_name = Some(
                        line.trim_start_matches("PRETTY_NAME=")
                            .trim_matches('"')
                            .to_string(),
                    );
                    break;
                }
            }
        }

        info
    }
}

impl SpoolerInfo {
    fn collect(service_command: &str) -> Self {
        let mut info = Self::default();

        if let Some(program) = service_command.split_whitespace().next() {
            info.program = Some(program.to_string());

            if let Ok(output) = Command::new("which").arg(program).output() {
                if output.status.success() {
                    info.resolved =
                        Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
                }
            }
        }

        // CUPS scheduler status, best-effort
        if let Ok(output) = Command::new("lpstat").arg("-r").output() {
            if output.status.success() {
                info.scheduler = Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }

        info
    }
}

impl DeviceInfo {
    fn collect(device_paths: &[std::path::PathBuf]) -> Self {
        let candidates = device_paths
            .iter()
            .map(|p| (p.display().to_string(), p.exists()))
            .collect();
        Self { candidates }
    }
}

impl StateInfo {
    fn collect(directory: &Path) -> Self {
        let mut info = Self::default();

        info.directory = Some(directory.display().to_string());
        info.state_file_exists = directory.join(STATE_FILE_NAME).exists();

        // A short-lived probe file answers "can the daemon save here"
        let probe = directory.join(".onepress-probe");
        info.writable = fs::write(&probe, b"probe").is_ok();
        let _ = fs::remove_file(&probe);

        info
    }
}

impl ConfigInfo {
    fn collect() -> Self {
        let mut info = Self::default();

        let config_path = config_file_path();

        if config_path.exists() {
            info.config_path = Some(config_path.display().to_string());

            if let Ok(content) = fs::read_to_string(&config_path) {
                let mut redacted = String::new();
                for line in content.lines() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                        continue;
                    }
                    if trimmed.to_lowercase().contains("api_key")
                        || trimmed.to_lowercase().contains("secret")
                        || trimmed.to_lowercase().contains("token")
                    {
                        if let Some(key) = trimmed.split('=').next() {
                            redacted.push_str(&format!("{} = [REDACTED]\n", key.trim()));
                        }
                    } else {
                        redacted.push_str(line);
                        redacted.push('\n');
                    }
                }
                info.config_contents = Some(redacted);
            }
        }

        info
    }
}

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "OnePress Diagnostics")?;
        writeln!(f, "====================")?;
        writeln!(f)?;
        writeln!(f, "OnePress Version: {}", self.onepress_version)?;
        writeln!(f)?;

        // OS
        writeln!(f, "## Operating System")?;
        if let Some(ref kernel) = self.os.kernel {
            writeln!(f, "Kernel: {}", kernel)?;
        }
        if let Some(ref os_name) = self.os.os_name {
            writeln!(f, "OS: {}", os_name)?;
        }
        writeln!(f)?;

        // Spooler
        writeln!(f, "## Print Spooler")?;
        if let Some(ref program) = self.spooler.program {
            writeln!(f, "Service program: {}", program)?;
            match self.spooler.resolved {
                Some(ref resolved) => writeln!(f, "Resolved to: {}", resolved)?,
                None => writeln!(f, "Resolved to: (not found on PATH)")?,
            }
        } else {
            writeln!(f, "Service program: (none configured)")?;
        }
        if let Some(ref scheduler) = self.spooler.scheduler {
            writeln!(f, "Scheduler: {}", scheduler)?;
        } else {
            writeln!(f, "Scheduler: (lpstat not available)")?;
        }
        writeln!(f)?;

        // Devices
        writeln!(f, "## Device Nodes")?;
        if self.devices.candidates.is_empty() {
            writeln!(f, "(no device paths configured)")?;
        }
        for (path, present) in &self.devices.candidates {
            writeln!(
                f,
                "{}: {}",
                path,
                if *present { "present" } else { "missing" }
            )?;
        }
        writeln!(f)?;

        // State
        writeln!(f, "## State Directory")?;
        if let Some(ref directory) = self.state.directory {
            writeln!(f, "Directory: {}", directory)?;
        }
        writeln!(
            f,
            "Writable: {}",
            if self.state.writable { "yes" } else { "NO" }
        )?;
        writeln!(
            f,
            "State file: {}",
            if self.state.state_file_exists {
                "present"
            } else {
                "(not created)"
            }
        )?;
        writeln!(f)?;

        // Config
        writeln!(f, "## OnePress Configuration")?;
        if let Some(ref path) = self.config.config_path {
            writeln!(f, "Config file: {}", path)?;
            if let Some(ref contents) = self.config.config_contents {
                writeln!(f)?;
                writeln!(f, "```ini")?;
                write!(f, "{}", contents)?;
                writeln!(f, "```")?;
            }
        } else {
            writeln!(f, "Config file: (not created - run 'onepress config init')")?;
        }
        writeln!(f)?;

        writeln!(f, "---")?;
        writeln!(f, "Copy the above output into your GitHub issue.")?;

        Ok(())
    }
}
