//! Trigger ingestion.
//!
//! A [`TriggerHandle`] is the entry point a button callback, GPIO
//! interrupt thread or CLI command calls on every press. It stamps the
//! observation and hands it straight to the coalescer; the call never
//! blocks on job execution.

use crate::coalescer::{CoalesceDecision, EventCoalescer};
use crate::job::TriggerEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cloneable entry point for raw trigger observations.
///
/// All clones share one sequence counter, so every observed press gets a
/// distinct sequence number no matter which handle saw it.
#[derive(Clone)]
pub struct TriggerHandle {
    sequence: Arc<AtomicU64>,
    coalescer: Arc<EventCoalescer>,
}

impl TriggerHandle {
    /// Creates a handle feeding the given coalescer.
    pub fn new(coalescer: Arc<EventCoalescer>) -> Self {
        Self {
            sequence: Arc::new(AtomicU64::new(0)),
            coalescer,
        }
    }

    /// Records one physical press, observed now.
    ///
    /// Returns what became of it: a new job or a merge into an existing
    /// one. Callers that only fire-and-forget can ignore the decision.
    pub fn press(&self) -> CoalesceDecision {
        let sequence_no = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.coalescer.observe(TriggerEvent::new(sequence_no))
    }

    /// How many presses this handle family has observed.
    pub fn observed(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for TriggerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerHandle")
            .field("observed", &self.observed())
            .finish_non_exhaustive()
    }
}
