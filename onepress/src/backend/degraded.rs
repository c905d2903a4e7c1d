//! Always-succeeds fallback, last in the chain.

use super::{render_payload, BackendFuture, BackendSuccess, OutputBackend};
use crate::job::{BackendId, Job};
use tracing::warn;

/// Records the job in the log when every real backend has failed.
///
/// Its existence guarantees that an accepted job always reaches a terminal
/// outcome even with all hardware gone. The outcome is flagged
/// `degraded = true`; whether that still counts as a success is a policy
/// knob, not this backend's concern.
#[derive(Debug, Default)]
pub struct DegradedBackend;

impl DegradedBackend {
    /// Creates the fallback backend.
    pub fn new() -> Self {
        Self
    }
}

impl OutputBackend for DegradedBackend {
    fn id(&self) -> BackendId {
        BackendId::Degraded
    }

    fn invoke<'a>(&'a self, job: &'a Job) -> BackendFuture<'a> {
        Box::pin(async move {
            warn!(
                job_id = %job.job_id,
                payload = render_payload(job).trim(),
                "No output path available, job recorded in log only"
            );
            Ok(BackendSuccess::new("recorded in log only"))
        })
    }
}
