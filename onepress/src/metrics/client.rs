//! Metrics emission layer.
//!
//! The [`MetricsClient`] provides a fire-and-forget interface for emitting
//! metric events. It's designed to be:
//!
//! - **Cheap to clone**: Backed by a channel sender
//! - **Fire-and-forget**: Never blocks, silently drops if the daemon is gone
//! - **Type-safe**: Convenience methods for each event type

use super::event::MetricEvent;
use crate::job::{JobOutcome, WorkerState};
use tokio::sync::mpsc;

/// Client for emitting metric events to the metrics daemon.
///
/// This is the primary interface for pipeline components to record what
/// happened. It wraps an unbounded channel sender and provides typed
/// convenience methods for each event type.
///
/// # Fire-and-Forget Semantics
///
/// All methods are fire-and-forget: they never block and silently ignore
/// failures (e.g., if the daemon has shut down). This ensures metrics
/// collection never impacts pipeline latency.
#[derive(Clone)]
pub struct MetricsClient {
    tx: mpsc::UnboundedSender<MetricEvent>,
}

impl MetricsClient {
    /// Creates a new metrics client with the given channel sender.
    pub fn new(tx: mpsc::UnboundedSender<MetricEvent>) -> Self {
        Self { tx }
    }

    /// Sends an event to the daemon (fire-and-forget).
    #[inline]
    fn send(&self, event: MetricEvent) {
        // Ignore send errors - daemon may have shut down
        let _ = self.tx.send(event);
    }

    // =========================================================================
    // Trigger and Coalescing Events
    // =========================================================================

    /// Records one raw trigger observation.
    #[inline]
    pub fn trigger_observed(&self) {
        self.send(MetricEvent::TriggerObserved);
    }

    /// Records the coalescer emitting a new job.
    #[inline]
    pub fn job_emitted(&self) {
        self.send(MetricEvent::JobEmitted);
    }

    /// Records a trigger merged into an existing job.
    #[inline]
    pub fn job_coalesced(&self) {
        self.send(MetricEvent::JobCoalesced);
    }

    // =========================================================================
    // Worker Events
    // =========================================================================

    /// Records the worker changing state.
    #[inline]
    pub fn worker_state_changed(&self, state: WorkerState) {
        self.send(MetricEvent::WorkerStateChanged { state });
    }

    /// Records a job reaching its terminal outcome.
    #[inline]
    pub fn job_completed(&self, outcome: JobOutcome) {
        self.send(MetricEvent::JobCompleted { outcome });
    }
}

impl std::fmt::Debug for MetricsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsClient")
            .field("channel_closed", &self.tx.is_closed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
