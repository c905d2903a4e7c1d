//! Metrics aggregation daemon.
//!
//! The [`MetricsDaemon`] runs as an independent async task that:
//!
//! 1. Receives events from the channel (sent by `MetricsClient`)
//! 2. Updates the counter ledger and tracks the worker's state
//! 3. Publishes a snapshot to a shared handle for reporters to read
//! 4. Forwards a persistable snapshot to the state daemon after each event
//!
//! # Design Notes
//!
//! The daemon owns mutable state and is the only writer. Reporters access
//! state through a shared `RwLock` handle that the daemon refreshes on a
//! timer. This ensures reporters never block event processing.

use super::event::MetricEvent;
use super::state::Counters;
use crate::job::{FailureKind, JobOutcome, WorkerState};
use crate::persist::{PersistedOutcome, PersistedState, PersistedWorkerState, StateClient};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between shared snapshot refreshes (100ms).
const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Shared state handle for read-only access by reporters.
pub type SharedMetricsState = Arc<RwLock<MetricsSnapshot>>;

/// Point-in-time view of the pipeline for reporters.
#[derive(Clone, Debug)]
pub struct MetricsSnapshot {
    /// The counter ledger.
    pub counters: Counters,

    /// What the worker was doing when the snapshot was taken.
    pub worker_state: WorkerState,

    /// The most recent terminal outcome.
    pub last_outcome: Option<PersistedOutcome>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            counters: Counters::new(),
            worker_state: WorkerState::Idle,
            last_outcome: None,
        }
    }
}

/// The metrics aggregation daemon.
///
/// Seeded from the persisted state at startup so counters continue across
/// restarts instead of starting over.
pub struct MetricsDaemon {
    /// Channel receiver for incoming events.
    rx: mpsc::UnboundedReceiver<MetricEvent>,

    /// Current counter ledger.
    counters: Counters,

    /// Worker state as last reported.
    worker_state: WorkerState,

    /// Most recent terminal outcome, in storable form.
    last_outcome: Option<PersistedOutcome>,

    /// Whether a degraded outcome lands in `jobs_succeeded` or in the
    /// failure ledger under the degraded backend.
    degraded_counts_as_success: bool,

    /// Shared state handle for reporters.
    shared_state: SharedMetricsState,

    /// Write-behind persistence, when wired.
    state_client: Option<StateClient>,
}

impl MetricsDaemon {
    /// Creates a new metrics daemon.
    ///
    /// # Arguments
    ///
    /// * `rx` - Channel receiver for incoming events
    /// * `seed` - Persisted state from the previous run (counters continue)
    /// * `degraded_counts_as_success` - Counter policy for degraded outcomes
    /// * `state_client` - Destination for persistable snapshots, if any
    pub fn new(
        rx: mpsc::UnboundedReceiver<MetricEvent>,
        seed: PersistedState,
        degraded_counts_as_success: bool,
        state_client: Option<StateClient>,
    ) -> Self {
        let snapshot = MetricsSnapshot {
            counters: seed.counters.clone(),
            worker_state: WorkerState::Idle,
            last_outcome: seed.last_outcome.clone(),
        };
        Self {
            rx,
            counters: seed.counters,
            worker_state: WorkerState::Idle,
            last_outcome: seed.last_outcome,
            degraded_counts_as_success,
            shared_state: Arc::new(RwLock::new(snapshot)),
            state_client,
        }
    }

    /// Returns a handle to the shared state.
    ///
    /// Reporters use this handle to read the current snapshot.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.shared_state)
    }

    /// Runs the daemon until shutdown is signaled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Metrics daemon starting");

        let mut sample_interval = tokio::time::interval(SAMPLE_INTERVAL);
        // Don't let missed ticks pile up
        sample_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                // Check shutdown first
                _ = shutdown.cancelled() => {
                    info!("Metrics daemon shutting down");
                    break;
                }

                // Process incoming events
                Some(event) = self.rx.recv() => {
                    self.process_event(event);
                }

                // Refresh the reporter snapshot
                _ = sample_interval.tick() => {
                    self.update_shared_state();
                }
            }
        }

        // Events already queued at shutdown still count; the worker's last
        // outcome often arrives in the same instant the token is cancelled.
        while let Ok(event) = self.rx.try_recv() {
            self.process_event(event);
        }
        self.update_shared_state();
        self.forward_persisted();
        debug!("Metrics daemon stopped");
    }

    /// Processes a single event, updating the ledger.
    fn process_event(&mut self, event: MetricEvent) {
        match event {
            MetricEvent::TriggerObserved => {
                self.counters.events_total += 1;
            }
            MetricEvent::JobEmitted => {
                self.counters.jobs_emitted += 1;
            }
            MetricEvent::JobCoalesced => {
                self.counters.jobs_coalesced += 1;
            }
            MetricEvent::WorkerStateChanged { state } => {
                self.worker_state = state;
            }
            MetricEvent::JobCompleted { outcome } => {
                self.record_outcome(outcome);
            }
        }
        self.forward_persisted();
    }

    /// Folds a terminal outcome into the ledger.
    fn record_outcome(&mut self, outcome: JobOutcome) {
        match outcome.error {
            Some(FailureKind::WorkerFault) => {
                self.counters.worker_faults += 1;
            }
            Some(FailureKind::BackendExhausted) => {
                // The chain records one attempt per failed backend; the last
                // one attempted gets the ledger entry.
                match outcome.attempts.last() {
                    Some(attempt) => self.counters.record_failure(attempt.backend),
                    None => warn!(
                        job_id = %outcome.job_id,
                        "Exhausted outcome carries no attempts; failure not attributed"
                    ),
                }
            }
            None => {
                if outcome.degraded && !self.degraded_counts_as_success {
                    self.counters.record_failure(crate::job::BackendId::Degraded);
                } else {
                    self.counters.jobs_succeeded += 1;
                }
            }
        }

        debug!(
            job_id = %outcome.job_id,
            success = outcome.success,
            degraded = outcome.degraded,
            attempts = outcome.attempts.len(),
            duration_ms = outcome.duration.as_millis() as u64,
            "Job outcome recorded"
        );
        self.last_outcome = Some(PersistedOutcome::from_outcome(&outcome));
    }

    /// Refreshes the reporter snapshot.
    fn update_shared_state(&self) {
        if let Ok(mut guard) = self.shared_state.write() {
            guard.counters = self.counters.clone();
            guard.worker_state = self.worker_state;
            guard.last_outcome = self.last_outcome.clone();
        }
    }

    /// Hands the current ledger to the write-behind persistence daemon.
    fn forward_persisted(&self) {
        let Some(client) = &self.state_client else {
            return;
        };
        let worker_state_at_save = match self.worker_state {
            WorkerState::Idle => PersistedWorkerState::Idle,
            WorkerState::Processing(id) => PersistedWorkerState::Processing {
                job_id: id.as_u64(),
            },
        };
        client.persist(PersistedState {
            counters: self.counters.clone(),
            last_outcome: self.last_outcome.clone(),
            worker_state_at_save,
            // Stamped by the state daemon at write time.
            saved_at: String::new(),
        });
    }
}

impl std::fmt::Debug for MetricsDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsDaemon")
            .field("events_total", &self.counters.events_total)
            .field("jobs_emitted", &self.counters.jobs_emitted)
            .field("worker_state", &self.worker_state)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
