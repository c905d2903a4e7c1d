//! Print-service backend, second in the chain.

use super::process::{run_bounded, RunError};
use super::{render_payload, BackendError, BackendFuture, BackendSuccess, OutputBackend};
use crate::job::{BackendId, Job};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Default time limit for one spooler submission.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(20);

/// Hands the job to an OS-level spooler command (`lp` by default).
///
/// The configured command line is split on whitespace; the job payload is
/// piped to the spooler's stdin. A zero exit means the spooler accepted
/// the job, which is as far as this backend can see.
pub struct ServiceBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ServiceBackend {
    /// Creates a service backend from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty command line, which config validation
    /// treats as the backend being unconfigured.
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    /// The spooler program this backend submits to.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl OutputBackend for ServiceBackend {
    fn id(&self) -> BackendId {
        BackendId::Service
    }

    fn invoke<'a>(&'a self, job: &'a Job) -> BackendFuture<'a> {
        Box::pin(async move {
            debug!(
                job_id = %job.job_id,
                service = %self.program,
                "Submitting job to output service"
            );

            let mut command = Command::new(&self.program);
            command.args(&self.args);
            let payload = render_payload(job).into_bytes();

            let output = run_bounded(command, Some(payload), self.timeout)
                .await
                .map_err(|err| match err {
                    RunError::Spawn(io) if io.kind() == std::io::ErrorKind::NotFound => {
                        BackendError::DeviceUnavailable(format!(
                            "service command not found: {}",
                            self.program
                        ))
                    }
                    RunError::Spawn(io) => {
                        BackendError::Process(format!("failed to launch service: {}", io))
                    }
                    RunError::TimedOut => BackendError::Timeout {
                        limit: self.timeout,
                    },
                    RunError::Wait(io) => {
                        BackendError::Other(format!("failed waiting on service: {}", io))
                    }
                })?;

            if output.status.success() {
                return Ok(BackendSuccess::new(format!(
                    "accepted by {}",
                    self.program
                )));
            }

            match output.status.code() {
                Some(code) if output.stderr.is_empty() => Err(BackendError::Process(format!(
                    "service exited {}",
                    code
                ))),
                Some(code) => Err(BackendError::Process(format!(
                    "service exited {}: {}",
                    code, output.stderr
                ))),
                None => Err(BackendError::Other(
                    "service terminated by signal".to_string(),
                )),
            }
        })
    }
}

impl std::fmt::Debug for ServiceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBackend")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("timeout", &self.timeout)
            .finish()
    }
}
