//! INI generation for writing `ConfigFile` → disk.
//!
//! Produces a fully commented config file so users can discover every
//! setting by opening the file, without consulting external docs.

use std::path::Path;

use super::defaults::*;
use super::settings::ConfigFile;

/// Render a `ConfigFile` as a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"; OnePress configuration file
; Location: ~/.onepress/config.ini
;
; Lines starting with ; are comments. Remove the setting or leave the
; file untouched to keep the built-in default.

[coalescer]
; Seconds after a job is emitted during which further presses merge into
; it while the worker is idle. 0 disables merging at rest.
; Default: {default_idle}
idle_window_secs = {idle}

; Seconds during which presses merge into the in-flight job while the
; worker is busy. Never below idle_window_secs.
; Default: {default_processing}
processing_window_secs = {processing}

; Whether a press arriving outside the processing window, while a job is
; still running, may emit a new queued job (true) or is absorbed into the
; running one (false).
; Default: true
accept_while_busy = {accept_while_busy}

[backends]
; Executable invoked first for each job. Leave empty to skip the script
; backend entirely.
; Default: (empty)
script_path = {script_path}

; Seconds the script may run before it is killed.
; Default: {default_script_timeout}
script_timeout_secs = {script_timeout}

; Command line for the spooler service backend, e.g. "lp -d office".
; Leave empty to skip the service backend.
; Default: {default_service_command}
service_command = {service_command}

; Seconds the service command may run before it is killed.
; Default: {default_service_timeout}
service_timeout_secs = {service_timeout}

; Comma-separated device nodes tried in order for the raw device backend.
; Default: {default_device_paths}
device_paths = {device_paths}

; Whether the degraded log-only backend sits at the end of the chain and
; catches jobs every other backend failed.
; Default: true
enable_degraded = {enable_degraded}

; Whether a job rescued by the degraded backend counts as a success in
; the metrics.
; Default: true
degraded_counts_as_success = {degraded_counts_as_success}

[state]
; Directory holding the persisted counters and last job outcome.
; Default: ~/.onepress
directory = {state_directory}

[logging]
; Log file path.
; Default: ~/.onepress/{log_file_name}
file = {log_file}
"#,
        default_idle = DEFAULT_IDLE_WINDOW_SECS,
        idle = config.coalescer.idle_window_secs,
        default_processing = DEFAULT_PROCESSING_WINDOW_SECS,
        processing = config.coalescer.processing_window_secs,
        accept_while_busy = config.coalescer.accept_while_busy,
        script_path = config
            .backends
            .script_path
            .as_deref()
            .map(path_to_string)
            .unwrap_or_default(),
        default_script_timeout = DEFAULT_SCRIPT_TIMEOUT_SECS,
        script_timeout = config.backends.script_timeout_secs,
        default_service_command = DEFAULT_SERVICE_COMMAND,
        service_command = config.backends.service_command,
        default_service_timeout = DEFAULT_SERVICE_TIMEOUT_SECS,
        service_timeout = config.backends.service_timeout_secs,
        default_device_paths = DEFAULT_DEVICE_CANDIDATES.join(", "),
        device_paths = config
            .backends
            .device_paths
            .iter()
            .map(|p| path_to_string(p))
            .collect::<Vec<_>>()
            .join(", "),
        enable_degraded = config.backends.enable_degraded,
        degraded_counts_as_success = config.backends.degraded_counts_as_success,
        state_directory = path_to_string(&config.state.directory),
        log_file_name = LOG_FILE_NAME,
        log_file = path_to_string(&config.logging.file),
    )
}

/// Render a path, collapsing the home directory prefix back to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
