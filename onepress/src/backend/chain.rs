//! Ordered fallback over the configured backends.

use super::OutputBackend;
use crate::job::{AttemptRecord, Job, JobOutcome};
use std::time::Instant;
use tracing::{error, info, warn};

/// Tries backends in order until one produces the job's output.
///
/// The chain owns its backends and never reorders them. Every failed
/// attempt is recorded, so an outcome that succeeded on a later backend
/// still tells the whole story of what failed first.
pub struct BackendChain {
    backends: Vec<Box<dyn OutputBackend>>,
}

impl BackendChain {
    /// Creates a chain over the given backends, tried in the given order.
    pub fn new(backends: Vec<Box<dyn OutputBackend>>) -> Self {
        Self { backends }
    }

    /// Number of backends in the chain.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// True when no backends are configured.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// IDs of the configured backends, in chain order.
    pub fn backend_ids(&self) -> Vec<crate::job::BackendId> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Drives one job to its terminal outcome.
    ///
    /// Stops at the first success. An empty or fully failed chain yields an
    /// exhausted outcome; the caller never sees an error.
    pub async fn execute(&self, job: &Job) -> JobOutcome {
        let started = Instant::now();
        let mut attempts = Vec::new();

        for backend in &self.backends {
            let attempt_started = Instant::now();
            match backend.invoke(job).await {
                Ok(success) => {
                    info!(
                        job_id = %job.job_id,
                        backend = %backend.id(),
                        coalesced = job.coalesced_count,
                        failed_attempts = attempts.len(),
                        elapsed_ms = started.elapsed().as_millis(),
                        detail = %success.detail,
                        "Job completed"
                    );
                    return JobOutcome::succeeded(
                        job.job_id,
                        backend.id(),
                        attempts,
                        started.elapsed(),
                    );
                }
                Err(err) => {
                    warn!(
                        job_id = %job.job_id,
                        backend = %backend.id(),
                        kind = %err.kind(),
                        error = %err,
                        "Backend failed, falling through"
                    );
                    attempts.push(AttemptRecord {
                        backend: backend.id(),
                        kind: err.kind(),
                        elapsed: attempt_started.elapsed(),
                        detail: err.to_string(),
                    });
                }
            }
        }

        error!(
            job_id = %job.job_id,
            attempts = attempts.len(),
            "Every backend failed, job is lost"
        );
        JobOutcome::exhausted(job.job_id, attempts, started.elapsed())
    }
}

impl std::fmt::Debug for BackendChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendChain")
            .field("backends", &self.backend_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendFuture, BackendSuccess};
    use crate::job::{BackendId, ErrorKind, FailureKind, TriggerEvent};
    use std::time::Duration;

    enum StubBehavior {
        Succeed,
        FailProcess,
        FailTimeout,
    }

    struct StubBackend {
        id: BackendId,
        behavior: StubBehavior,
    }

    impl StubBackend {
        fn boxed(id: BackendId, behavior: StubBehavior) -> Box<dyn OutputBackend> {
            Box::new(Self { id, behavior })
        }
    }

    impl OutputBackend for StubBackend {
        fn id(&self) -> BackendId {
            self.id
        }

        fn invoke<'a>(&'a self, _job: &'a Job) -> BackendFuture<'a> {
            Box::pin(async move {
                match self.behavior {
                    StubBehavior::Succeed => Ok(BackendSuccess::new("stub ok")),
                    StubBehavior::FailProcess => {
                        Err(BackendError::Process("stub exited 1".to_string()))
                    }
                    StubBehavior::FailTimeout => Err(BackendError::Timeout {
                        limit: Duration::from_secs(1),
                    }),
                }
            })
        }
    }

    fn create_job() -> Job {
        Job::from_trigger(&TriggerEvent::new(1))
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = BackendChain::new(vec![
            StubBackend::boxed(BackendId::Script, StubBehavior::Succeed),
            StubBackend::boxed(BackendId::Service, StubBehavior::Succeed),
        ]);

        let outcome = chain.execute(&create_job()).await;
        assert!(outcome.success);
        assert_eq!(outcome.backend_used, Some(BackendId::Script));
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_preserves_failed_attempt() {
        let chain = BackendChain::new(vec![
            StubBackend::boxed(BackendId::Script, StubBehavior::FailTimeout),
            StubBackend::boxed(BackendId::Service, StubBehavior::Succeed),
        ]);

        let outcome = chain.execute(&create_job()).await;
        assert!(outcome.success);
        assert_eq!(outcome.backend_used, Some(BackendId::Service));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].backend, BackendId::Script);
        assert_eq!(outcome.attempts[0].kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_exhausted_chain_records_every_attempt() {
        let chain = BackendChain::new(vec![
            StubBackend::boxed(BackendId::Script, StubBehavior::FailTimeout),
            StubBackend::boxed(BackendId::Service, StubBehavior::FailProcess),
            StubBackend::boxed(BackendId::RawDevice, StubBehavior::FailProcess),
        ]);

        let outcome = chain.execute(&create_job()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.backend_used, None);
        assert_eq!(outcome.error, Some(FailureKind::BackendExhausted));
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(
            outcome
                .attempts
                .iter()
                .map(|a| a.backend)
                .collect::<Vec<_>>(),
            vec![BackendId::Script, BackendId::Service, BackendId::RawDevice]
        );
    }

    #[tokio::test]
    async fn test_degraded_tail_rescues_exhausted_chain() {
        let chain = BackendChain::new(vec![
            StubBackend::boxed(BackendId::Script, StubBehavior::FailProcess),
            Box::new(crate::backend::DegradedBackend::new()),
        ]);

        let outcome = chain.execute(&create_job()).await;
        assert!(outcome.success);
        assert!(outcome.degraded);
        assert_eq!(outcome.backend_used, Some(BackendId::Degraded));
        assert_eq!(outcome.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let chain = BackendChain::new(Vec::new());
        let outcome = chain.execute(&create_job()).await;
        assert!(!outcome.success);
        assert!(outcome.attempts.is_empty());
    }
}
