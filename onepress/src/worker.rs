//! Single-flight job execution.
//!
//! One worker loop owns job execution for the whole process. It dequeues
//! one job, drives it through the backend chain to a terminal outcome, and
//! only then looks at the queue again. No second job is ever started while
//! one is in flight, which is what makes the in-flight job a safe merge
//! target for the coalescer.
//!
//! Each job runs inside its own task so a panic in a backend converts into
//! a `WorkerFault` outcome instead of killing the loop. An in-flight job
//! is never cancelled, not even during shutdown: partially produced
//! physical output is worse than a slow exit.

use crate::backend::BackendChain;
use crate::job::{Job, JobOutcome, WorkerState};
use crate::metrics::{MetricsClient, OptionalMetrics};
use crate::queue::JobQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How long one dequeue wait lasts before the loop re-checks for shutdown.
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// The one loop allowed to execute jobs.
pub struct SingleFlightWorker {
    queue: Arc<JobQueue>,
    chain: Arc<BackendChain>,
    state_tx: watch::Sender<WorkerState>,
    metrics: Option<MetricsClient>,
}

impl SingleFlightWorker {
    /// Creates a worker over `queue` and `chain`. The worker starts `Idle`.
    pub fn new(
        queue: Arc<JobQueue>,
        chain: Arc<BackendChain>,
        metrics: Option<MetricsClient>,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        Self {
            queue,
            chain,
            state_tx,
            metrics,
        }
    }

    /// Returns a receiver over the worker's state transitions.
    ///
    /// The coalescer reads point-in-time snapshots from this to find the
    /// in-flight job a busy-window trigger merges into.
    pub fn state_receiver(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    /// Runs the worker until `shutdown` is cancelled.
    ///
    /// Shutdown is honored between jobs, never during one: an in-flight
    /// job always runs to its terminal outcome first.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(backends = ?self.chain.backend_ids(), "Worker starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Worker shutting down");
                    break;
                }

                maybe_job = self.queue.dequeue(DEQUEUE_TIMEOUT) => {
                    if let Some(job) = maybe_job {
                        self.process(job).await;
                    }
                }
            }
        }

        debug!("Worker stopped");
    }

    /// Drives one job to its terminal outcome.
    async fn process(&self, job: Job) {
        let job_id = job.job_id;
        let started = Instant::now();

        self.publish(WorkerState::Processing(job_id));
        info!(
            job_id = %job_id,
            coalesced = job.coalesced_count,
            queue_depth = self.queue.len(),
            "Job started"
        );

        // The job runs in its own task so a panic surfaces here as a join
        // error instead of unwinding through the loop.
        let chain = Arc::clone(&self.chain);
        let outcome = match tokio::spawn(async move { chain.execute(&job).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(
                    job_id = %job_id,
                    error = %join_err,
                    "Job execution panicked, worker continuing"
                );
                JobOutcome::worker_fault(job_id, started.elapsed())
            }
        };

        // Idle goes out before the outcome so any snapshot taken at the
        // terminal event already reads the worker as free.
        self.publish(WorkerState::Idle);
        self.metrics.job_completed(outcome);
    }

    fn publish(&self, state: WorkerState) {
        self.state_tx.send_replace(state);
        self.metrics.worker_state_changed(state);
    }
}

impl std::fmt::Debug for SingleFlightWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightWorker")
            .field("state", &*self.state_tx.borrow())
            .field("queue_depth", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, BackendFuture, BackendSuccess, DegradedBackend, OutputBackend,
    };
    use crate::job::{BackendId, FailureKind, TriggerEvent};
    use crate::metrics::MetricEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    /// Panics on the first invocation, succeeds afterwards.
    struct PanicOnceBackend {
        invocations: AtomicUsize,
    }

    impl OutputBackend for PanicOnceBackend {
        fn id(&self) -> BackendId {
            BackendId::Script
        }

        fn invoke<'a>(&'a self, _job: &'a Job) -> BackendFuture<'a> {
            Box::pin(async move {
                if self.invocations.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("injected backend panic");
                }
                Ok(BackendSuccess::new("stub ok"))
            })
        }
    }

    /// Sleeps while tracking how many invocations overlap.
    struct SlowBackend {
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    impl OutputBackend for SlowBackend {
        fn id(&self) -> BackendId {
            BackendId::Script
        }

        fn invoke<'a>(&'a self, _job: &'a Job) -> BackendFuture<'a> {
            Box::pin(async move {
                let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now_active, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, BackendError>(BackendSuccess::new("slow ok"))
            })
        }
    }

    fn create_worker(
        chain: BackendChain,
    ) -> (
        SingleFlightWorker,
        Arc<JobQueue>,
        mpsc::UnboundedReceiver<MetricEvent>,
    ) {
        let queue = Arc::new(JobQueue::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SingleFlightWorker::new(
            Arc::clone(&queue),
            Arc::new(chain),
            Some(MetricsClient::new(tx)),
        );
        (worker, queue, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<MetricEvent>) -> Vec<MetricEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_worker_completes_queued_job() {
        let chain = BackendChain::new(vec![Box::new(DegradedBackend::new())]);
        let (worker, queue, mut rx) = create_worker(chain);

        queue.enqueue(Job::from_trigger(&TriggerEvent::new(1)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let events = drain(&mut rx);
        let completed = events
            .iter()
            .find_map(|e| match e {
                MetricEvent::JobCompleted { outcome } => Some(outcome.clone()),
                _ => None,
            })
            .unwrap();
        assert!(completed.success);
        assert_eq!(completed.backend_used, Some(BackendId::Degraded));
    }

    #[tokio::test]
    async fn test_idle_published_before_outcome() {
        let chain = BackendChain::new(vec![Box::new(DegradedBackend::new())]);
        let (worker, queue, mut rx) = create_worker(chain);

        queue.enqueue(Job::from_trigger(&TriggerEvent::new(1)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let events = drain(&mut rx);
        let idle_pos = events
            .iter()
            .position(|e| {
                matches!(
                    e,
                    MetricEvent::WorkerStateChanged {
                        state: WorkerState::Idle
                    }
                )
            })
            .unwrap();
        let completed_pos = events
            .iter()
            .position(|e| matches!(e, MetricEvent::JobCompleted { .. }))
            .unwrap();
        assert!(idle_pos < completed_pos);
    }

    #[tokio::test]
    async fn test_worker_survives_panicking_job() {
        let chain = BackendChain::new(vec![Box::new(PanicOnceBackend {
            invocations: AtomicUsize::new(0),
        })]);
        let (worker, queue, mut rx) = create_worker(chain);

        queue.enqueue(Job::from_trigger(&TriggerEvent::new(1)));
        queue.enqueue(Job::from_trigger(&TriggerEvent::new(2)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let outcomes: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                MetricEvent::JobCompleted { outcome } => Some(outcome),
                _ => None,
            })
            .collect();

        // First job faulted, second still ran and succeeded.
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].error, Some(FailureKind::WorkerFault));
        assert!(!outcomes[0].success);
        assert!(outcomes[1].success);
    }

    #[tokio::test]
    async fn test_jobs_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let chain = BackendChain::new(vec![Box::new(SlowBackend {
            active: Arc::clone(&active),
            max_active: Arc::clone(&max_active),
        })]);
        let (worker, queue, mut rx) = create_worker(chain);

        for seq in 1..=3 {
            queue.enqueue(Job::from_trigger(&TriggerEvent::new(seq)));
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        sleep(Duration::from_millis(400)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let completed = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e, MetricEvent::JobCompleted { .. }))
            .count();
        assert_eq!(completed, 3);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let chain = BackendChain::new(vec![Box::new(DegradedBackend::new())]);
        let (worker, _queue, _rx) = create_worker(chain);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_state_receiver_sees_transitions() {
        let chain = BackendChain::new(vec![Box::new(DegradedBackend::new())]);
        let (worker, queue, _rx) = create_worker(chain);
        let state_rx = worker.state_receiver();
        assert_eq!(*state_rx.borrow(), WorkerState::Idle);

        queue.enqueue(Job::from_trigger(&TriggerEvent::new(1)));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));
        sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        // The last published state after a completed job is Idle.
        assert_eq!(*state_rx.borrow(), WorkerState::Idle);
    }
}
