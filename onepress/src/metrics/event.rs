//! Metric events for the emission layer.
//!
//! Every component of the pipeline reports what happened by sending one of
//! these events to the metrics daemon. Events are fire-and-forget; producers
//! never wait for acknowledgment. The daemon is the single writer of the
//! aggregated counters, so processing events sequentially keeps the ledger
//! consistent without shared atomics.

use crate::job::{JobOutcome, WorkerState};

/// Events emitted by pipeline components to the metrics daemon.
#[derive(Clone, Debug)]
pub enum MetricEvent {
    /// One raw trigger was observed, before any coalescing decision.
    TriggerObserved,

    /// The coalescer emitted a new job.
    JobEmitted,

    /// The coalescer merged a trigger into an existing job.
    JobCoalesced,

    /// The worker changed state (idle or processing a specific job).
    WorkerStateChanged {
        /// The new state.
        state: WorkerState,
    },

    /// A job reached its terminal outcome.
    JobCompleted {
        /// The full terminal record, including failed attempts.
        outcome: JobOutcome,
    },
}

impl MetricEvent {
    /// Returns a short name for this event type (useful for debugging).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TriggerObserved => "trigger_observed",
            Self::JobEmitted => "job_emitted",
            Self::JobCoalesced => "job_coalesced",
            Self::WorkerStateChanged { .. } => "worker_state_changed",
            Self::JobCompleted { .. } => "job_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;

    #[test]
    fn test_event_types() {
        assert_eq!(MetricEvent::TriggerObserved.event_type(), "trigger_observed");
        assert_eq!(MetricEvent::JobEmitted.event_type(), "job_emitted");
        assert_eq!(
            MetricEvent::WorkerStateChanged {
                state: WorkerState::Processing(JobId::from(1)),
            }
            .event_type(),
            "worker_state_changed"
        );
    }

    #[test]
    fn test_event_debug() {
        let event = MetricEvent::WorkerStateChanged {
            state: WorkerState::Idle,
        };
        let debug = format!("{:?}", event);
        assert!(debug.contains("WorkerStateChanged"));
        assert!(debug.contains("Idle"));
    }
}
