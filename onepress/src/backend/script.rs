//! External-script backend, first in the chain.

use super::process::{run_bounded, RunError};
use super::{BackendError, BackendFuture, BackendSuccess, OutputBackend};
use crate::job::{BackendId, Job};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default time limit for one script invocation.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variables the script keeps from the parent process.
///
/// Everything else is cleared so the script runs the same way no matter
/// what shell started the daemon.
const PRESERVED_ENV: &[&str] = &["PATH", "HOME", "LANG"];

/// Invokes a user-provided executable with a fixed argument contract.
///
/// The script is called as:
///
/// ```text
/// <script> --job <id> --coalesced <count>
/// ```
///
/// Exit status 0 is success; anything else, a launch failure or the time
/// limit is a failed attempt.
pub struct ScriptBackend {
    path: PathBuf,
    timeout: Duration,
}

impl ScriptBackend {
    /// Creates a script backend for `path` with the given time limit.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// The executable this backend invokes.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn command(&self, job: &Job) -> Command {
        let mut command = Command::new(&self.path);
        command
            .arg("--job")
            .arg(job.job_id.as_u64().to_string())
            .arg("--coalesced")
            .arg(job.coalesced_count.to_string())
            .env_clear();
        for key in PRESERVED_ENV {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }
        command
    }
}

impl OutputBackend for ScriptBackend {
    fn id(&self) -> BackendId {
        BackendId::Script
    }

    fn invoke<'a>(&'a self, job: &'a Job) -> BackendFuture<'a> {
        Box::pin(async move {
            debug!(
                job_id = %job.job_id,
                script = %self.path.display(),
                "Invoking output script"
            );

            let output = run_bounded(self.command(job), None, self.timeout)
                .await
                .map_err(|err| match err {
                    RunError::Spawn(io) if io.kind() == std::io::ErrorKind::NotFound => {
                        BackendError::DeviceUnavailable(format!(
                            "script not found: {}",
                            self.path.display()
                        ))
                    }
                    RunError::Spawn(io) => {
                        BackendError::Process(format!("failed to launch script: {}", io))
                    }
                    RunError::TimedOut => BackendError::Timeout {
                        limit: self.timeout,
                    },
                    RunError::Wait(io) => {
                        BackendError::Other(format!("failed waiting on script: {}", io))
                    }
                })?;

            if output.status.success() {
                return Ok(BackendSuccess::new("script exited 0"));
            }

            // No exit code means the script died to a signal.
            match output.status.code() {
                Some(code) if output.stderr.is_empty() => {
                    Err(BackendError::Process(format!("script exited {}", code)))
                }
                Some(code) => Err(BackendError::Process(format!(
                    "script exited {}: {}",
                    code, output.stderr
                ))),
                None => Err(BackendError::Other(
                    "script terminated by signal".to_string(),
                )),
            }
        })
    }
}

impl std::fmt::Debug for ScriptBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBackend")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ErrorKind, TriggerEvent};
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn create_job() -> Job {
        Job::from_trigger(&TriggerEvent::new(1))
    }

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{}", body).unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_successful_script() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "ok.sh", "exit 0");
        let backend = ScriptBackend::new(path, DEFAULT_SCRIPT_TIMEOUT);

        let result = backend.invoke(&create_job()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_script_receives_job_arguments() {
        let dir = TempDir::new().unwrap();
        // Succeeds only when called with the fixed argument contract.
        let path = write_script(
            &dir,
            "args.sh",
            r#"[ "$1" = "--job" ] && [ "$3" = "--coalesced" ] && exit 0; exit 1"#,
        );
        let backend = ScriptBackend::new(path, DEFAULT_SCRIPT_TIMEOUT);

        let result = backend.invoke(&create_job()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_failing_script_carries_exit_and_stderr() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "fail.sh", "echo out of paper >&2; exit 2");
        let backend = ScriptBackend::new(path, DEFAULT_SCRIPT_TIMEOUT);

        let err = backend.invoke(&create_job()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
        let detail = err.to_string();
        assert!(detail.contains("exited 2"));
        assert!(detail.contains("out of paper"));
    }

    #[tokio::test]
    async fn test_missing_script_is_unavailable() {
        let backend = ScriptBackend::new("/nonexistent/print.sh", DEFAULT_SCRIPT_TIMEOUT);

        let err = backend.invoke(&create_job()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }

    #[tokio::test]
    async fn test_hung_script_times_out() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "hang.sh", "sleep 30");
        let backend = ScriptBackend::new(path, Duration::from_millis(100));

        let started = std::time::Instant::now();
        let err = backend.invoke(&create_job()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
