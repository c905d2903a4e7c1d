//! Trigger burst coalescing.
//!
//! A physical button produces bursts: contact bounce, double-presses,
//! impatient users. The [`EventCoalescer`] turns any burst into exactly one
//! job by deciding, per trigger, between `NewJob` and `MergedInto`.
//!
//! # Decision rule
//!
//! ```text
//! observe(event):
//!   count the event
//!   a job is pending in the queue?        -> merge into it (count bumped)
//!   worker is processing:
//!     within processing_window,
//!     or accept_while_busy is off         -> merge into the in-flight job
//!     otherwise                           -> new job, runs after current
//!   worker is idle:
//!     within idle_window of last emit     -> merge (late bounce, accounting)
//!     otherwise                           -> new job
//! ```
//!
//! Two windows with different characters: `idle_window` (~3s) absorbs
//! contact bounce while nothing runs; `processing_window` (~30s) absorbs
//! re-presses while a job runs and the user sees nothing happening yet.
//!
//! The decision is atomic with respect to other `observe` calls: one mutex
//! guards the emission timestamps, and queue membership is checked through
//! the queue's own lock. Two concurrent triggers never both open a job
//! inside one window.

use crate::job::{Job, JobId, TriggerEvent, WorkerState};
use crate::metrics::{MetricsClient, OptionalMetrics};
use crate::queue::JobQueue;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::debug;

/// Default debounce window while the worker is idle.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(3);

/// Default absorption window while a job is processing.
pub const DEFAULT_PROCESSING_WINDOW: Duration = Duration::from_secs(30);

/// Configuration for the coalescer.
#[derive(Clone, Debug)]
pub struct CoalescerConfig {
    /// Triggers within this window of the last emission merge while the
    /// worker is idle.
    pub idle_window: Duration,

    /// Triggers within this window of the last emission merge while a job
    /// is processing.
    pub processing_window: Duration,

    /// Whether a trigger past the processing window opens a new pending
    /// job (true) or keeps merging into the in-flight one (false).
    pub accept_while_busy: bool,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            idle_window: DEFAULT_IDLE_WINDOW,
            processing_window: DEFAULT_PROCESSING_WINDOW,
            accept_while_busy: true,
        }
    }
}

/// What the coalescer did with one trigger.
///
/// Merging is a normal outcome, not an error: the trigger's work will be
/// covered by the named job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoalesceDecision {
    /// The trigger opened a new job, now pending in the queue.
    NewJob {
        /// ID of the freshly created job.
        job_id: JobId,
    },

    /// The trigger was absorbed by an existing job.
    MergedInto {
        /// ID of the job that covers this trigger.
        job_id: JobId,
    },
}

impl CoalesceDecision {
    /// The job covering this trigger, whichever way the decision went.
    pub fn job_id(&self) -> JobId {
        match self {
            CoalesceDecision::NewJob { job_id } => *job_id,
            CoalesceDecision::MergedInto { job_id } => *job_id,
        }
    }

    /// True when a new job was created.
    pub fn is_new(&self) -> bool {
        matches!(self, CoalesceDecision::NewJob { .. })
    }
}

/// Window state guarded by the coalescer's mutex.
#[derive(Debug)]
struct CoalescerInner {
    /// When the last job was emitted. Merges never reset this.
    last_emitted_at: Option<Instant>,
    /// The last emitted job, target for idle-window merges after the job
    /// already left the queue.
    last_emitted_job_id: Option<JobId>,
}

/// Collapses trigger bursts into single jobs.
pub struct EventCoalescer {
    config: CoalescerConfig,
    queue: Arc<JobQueue>,
    worker_state: watch::Receiver<WorkerState>,
    metrics: Option<MetricsClient>,
    inner: Mutex<CoalescerInner>,
}

impl EventCoalescer {
    /// Creates a coalescer feeding `queue`, reading worker state snapshots
    /// from `worker_state`.
    pub fn new(
        config: CoalescerConfig,
        queue: Arc<JobQueue>,
        worker_state: watch::Receiver<WorkerState>,
        metrics: Option<MetricsClient>,
    ) -> Self {
        Self {
            config,
            queue,
            worker_state,
            metrics,
            inner: Mutex::new(CoalescerInner {
                last_emitted_at: None,
                last_emitted_job_id: None,
            }),
        }
    }

    /// Decides what to do with one trigger and carries the decision out.
    ///
    /// Non-blocking: under the mutex this only inspects timestamps, bumps a
    /// queued job's count, or pushes a new job. Safe to call from the
    /// trigger ingestion path.
    pub fn observe(&self, event: TriggerEvent) -> CoalesceDecision {
        self.metrics.trigger_observed();

        let mut inner = self.inner.lock().unwrap();
        let worker = *self.worker_state.borrow();

        // A queued job's count is still live; bump it and point the caller
        // at it. Once the worker pops the job this returns None and the
        // worker-state branches below take over.
        if let Some(job_id) = self.queue.merge_into_tail() {
            self.metrics.job_coalesced();
            debug!(
                sequence_no = event.sequence_no,
                job_id = %job_id,
                "Trigger merged into pending job"
            );
            return CoalesceDecision::MergedInto { job_id };
        }

        match worker {
            WorkerState::Processing(in_flight) => {
                let within_window = inner
                    .last_emitted_at
                    .map(|at| event.observed_at.duration_since(at) < self.config.processing_window)
                    .unwrap_or(false);

                if within_window || !self.config.accept_while_busy {
                    // The in-flight job covers this press. Its count is
                    // frozen; this is accounting only.
                    self.metrics.job_coalesced();
                    debug!(
                        sequence_no = event.sequence_no,
                        job_id = %in_flight,
                        "Trigger merged into in-flight job"
                    );
                    return CoalesceDecision::MergedInto { job_id: in_flight };
                }

                // The window expired and we accept new work while busy:
                // queue a successor that runs after the current job.
                self.emit(&mut inner, &event)
            }
            WorkerState::Idle => {
                if let (Some(at), Some(job_id)) =
                    (inner.last_emitted_at, inner.last_emitted_job_id)
                {
                    if event.observed_at.duration_since(at) < self.config.idle_window {
                        // Late bounce after the job already completed.
                        self.metrics.job_coalesced();
                        debug!(
                            sequence_no = event.sequence_no,
                            job_id = %job_id,
                            "Trigger merged into last emitted job"
                        );
                        return CoalesceDecision::MergedInto { job_id };
                    }
                }
                self.emit(&mut inner, &event)
            }
        }
    }

    /// Opens a new job: fresh ID, window reset, enqueued.
    fn emit(&self, inner: &mut CoalescerInner, event: &TriggerEvent) -> CoalesceDecision {
        let job = Job::from_trigger(event);
        let job_id = job.job_id;

        inner.last_emitted_at = Some(event.observed_at);
        inner.last_emitted_job_id = Some(job_id);
        self.queue.enqueue(job);
        self.metrics.job_emitted();

        debug!(
            sequence_no = event.sequence_no,
            job_id = %job_id,
            "New job emitted"
        );
        CoalesceDecision::NewJob { job_id }
    }

    /// Returns the configured windows and busy policy.
    pub fn config(&self) -> &CoalescerConfig {
        &self.config
    }
}

impl std::fmt::Debug for EventCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCoalescer")
            .field("config", &self.config)
            .field("queue_depth", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricEvent;
    use tokio::sync::mpsc;

    fn create_coalescer(
        config: CoalescerConfig,
    ) -> (EventCoalescer, Arc<JobQueue>, watch::Sender<WorkerState>) {
        let queue = Arc::new(JobQueue::new());
        let (state_tx, state_rx) = watch::channel(WorkerState::Idle);
        let coalescer = EventCoalescer::new(config, Arc::clone(&queue), state_rx, None);
        (coalescer, queue, state_tx)
    }

    #[tokio::test]
    async fn test_first_trigger_creates_job() {
        let (coalescer, queue, _state) = create_coalescer(CoalescerConfig::default());

        let decision = coalescer.observe(TriggerEvent::new(1));
        assert!(decision.is_new());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_burst_collapses_into_one_job() {
        let (coalescer, queue, _state) = create_coalescer(CoalescerConfig::default());
        let base = Instant::now();

        // Five presses inside 100ms while nothing runs.
        let first = coalescer.observe(TriggerEvent::at(1, base));
        assert!(first.is_new());
        for i in 2..=5 {
            let decision =
                coalescer.observe(TriggerEvent::at(i, base + Duration::from_millis(20 * i as u64)));
            assert_eq!(
                decision,
                CoalesceDecision::MergedInto {
                    job_id: first.job_id()
                }
            );
        }

        assert_eq!(queue.len(), 1);
        let job = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(job.coalesced_count, 4);
    }

    #[tokio::test]
    async fn test_idle_window_expiry_opens_new_job() {
        let config = CoalescerConfig::default();
        let (coalescer, queue, _state) = create_coalescer(config);
        let base = Instant::now();

        let first = coalescer.observe(TriggerEvent::at(1, base));
        // Worker picks the job up and completes it; queue drains.
        queue.dequeue(Duration::from_millis(10)).await.unwrap();

        // A bounce 2s later still merges even though the job is gone.
        let bounce = coalescer.observe(TriggerEvent::at(2, base + Duration::from_secs(2)));
        assert_eq!(
            bounce,
            CoalesceDecision::MergedInto {
                job_id: first.job_id()
            }
        );
        assert!(queue.is_empty());

        // 4s later the window has expired: a fresh press means a fresh job.
        let fresh = coalescer.observe(TriggerEvent::at(3, base + Duration::from_secs(4)));
        assert!(fresh.is_new());
        assert_ne!(fresh.job_id(), first.job_id());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_triggers_during_processing_merge_into_in_flight() {
        let (coalescer, queue, state) = create_coalescer(CoalescerConfig::default());
        let base = Instant::now();

        let first = coalescer.observe(TriggerEvent::at(1, base));
        let job = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        state.send(WorkerState::Processing(job.job_id)).unwrap();

        // Presses at +5s and +15s, both inside the 30s processing window.
        for (seq, secs) in [(2, 5), (3, 15)] {
            let decision = coalescer.observe(TriggerEvent::at(seq, base + Duration::from_secs(secs)));
            assert_eq!(
                decision,
                CoalesceDecision::MergedInto {
                    job_id: first.job_id()
                }
            );
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_expired_processing_window_queues_one_successor() {
        let (coalescer, queue, state) = create_coalescer(CoalescerConfig::default());
        let base = Instant::now();

        coalescer.observe(TriggerEvent::at(1, base));
        let job = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        state.send(WorkerState::Processing(job.job_id)).unwrap();

        // Past the 30s window, with accept_while_busy on: one successor.
        let successor = coalescer.observe(TriggerEvent::at(2, base + Duration::from_secs(31)));
        assert!(successor.is_new());
        assert_eq!(queue.len(), 1);

        // Ten seconds later the next press lands on the pending successor,
        // never on a third job.
        let merged = coalescer.observe(TriggerEvent::at(3, base + Duration::from_secs(41)));
        assert_eq!(
            merged,
            CoalesceDecision::MergedInto {
                job_id: successor.job_id()
            }
        );
        assert_eq!(queue.len(), 1);

        let pending = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(pending.coalesced_count, 1);
    }

    #[tokio::test]
    async fn test_accept_while_busy_off_merges_indefinitely() {
        let config = CoalescerConfig {
            accept_while_busy: false,
            ..CoalescerConfig::default()
        };
        let (coalescer, queue, state) = create_coalescer(config);
        let base = Instant::now();

        let first = coalescer.observe(TriggerEvent::at(1, base));
        let job = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        state.send(WorkerState::Processing(job.job_id)).unwrap();

        // Even far past the processing window nothing new is queued.
        let decision = coalescer.observe(TriggerEvent::at(2, base + Duration::from_secs(300)));
        assert_eq!(
            decision,
            CoalesceDecision::MergedInto {
                job_id: first.job_id()
            }
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_decisions_emit_metric_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = Arc::new(JobQueue::new());
        let (_state_tx, state_rx) = watch::channel(WorkerState::Idle);
        let coalescer = EventCoalescer::new(
            CoalescerConfig::default(),
            Arc::clone(&queue),
            state_rx,
            Some(MetricsClient::new(tx)),
        );
        let base = Instant::now();

        coalescer.observe(TriggerEvent::at(1, base));
        coalescer.observe(TriggerEvent::at(2, base + Duration::from_millis(10)));

        assert!(matches!(rx.try_recv(), Ok(MetricEvent::TriggerObserved)));
        assert!(matches!(rx.try_recv(), Ok(MetricEvent::JobEmitted)));
        assert!(matches!(rx.try_recv(), Ok(MetricEvent::TriggerObserved)));
        assert!(matches!(rx.try_recv(), Ok(MetricEvent::JobCoalesced)));
    }

    #[tokio::test]
    async fn test_decision_accessors() {
        let id = JobId::from(11);
        let new = CoalesceDecision::NewJob { job_id: id };
        let merged = CoalesceDecision::MergedInto { job_id: id };

        assert!(new.is_new());
        assert!(!merged.is_new());
        assert_eq!(new.job_id(), id);
        assert_eq!(merged.job_id(), id);
    }
}
