//! Aggregated counter state.
//!
//! The metrics daemon owns one mutable [`Counters`] and updates it from
//! incoming events. Reporters and the persistence layer read cloned
//! snapshots. Rates are always derived on read, never stored, so the
//! counters stay the single source of truth.

use crate::job::BackendId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The pipeline's counter ledger.
///
/// Serializable because the persisted state file carries the same counters
/// across restarts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Raw triggers observed, before coalescing.
    pub events_total: u64,

    /// Jobs the coalescer created.
    pub jobs_emitted: u64,

    /// Triggers merged into an existing job instead of creating one.
    pub jobs_coalesced: u64,

    /// Jobs that reached a successful terminal outcome.
    pub jobs_succeeded: u64,

    /// Failed jobs, attributed to the last backend that was attempted.
    pub jobs_failed_by_backend: BTreeMap<BackendId, u64>,

    /// Jobs terminated by a panic in the driving code rather than a
    /// backend failure.
    pub worker_faults: u64,
}

impl Counters {
    /// Creates a ledger with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failed job against `backend`.
    pub fn record_failure(&mut self, backend: BackendId) {
        *self.jobs_failed_by_backend.entry(backend).or_insert(0) += 1;
    }

    /// Total failed jobs across all backends, including worker faults.
    pub fn jobs_failed_total(&self) -> u64 {
        self.jobs_failed_by_backend.values().sum::<u64>() + self.worker_faults
    }

    /// Fraction of emitted jobs that succeeded.
    ///
    /// `None` until at least one job has been emitted. Jobs still pending
    /// drag the rate down until they complete; with single-flight execution
    /// that is at most one job's worth of skew.
    pub fn success_rate(&self) -> Option<f64> {
        if self.jobs_emitted == 0 {
            return None;
        }
        Some(self.jobs_succeeded as f64 / self.jobs_emitted as f64)
    }

    /// Fraction of observed triggers that were merged away.
    ///
    /// `None` until at least one trigger has been observed.
    pub fn coalesce_rate(&self) -> Option<f64> {
        if self.events_total == 0 {
            return None;
        }
        Some(self.jobs_coalesced as f64 / self.events_total as f64)
    }

    /// Resets every counter to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = Counters::new();
        assert_eq!(counters.events_total, 0);
        assert_eq!(counters.jobs_emitted, 0);
        assert_eq!(counters.jobs_failed_total(), 0);
        assert_eq!(counters.success_rate(), None);
        assert_eq!(counters.coalesce_rate(), None);
    }

    #[test]
    fn test_record_failure_by_backend() {
        let mut counters = Counters::new();
        counters.record_failure(BackendId::Script);
        counters.record_failure(BackendId::Script);
        counters.record_failure(BackendId::RawDevice);

        assert_eq!(counters.jobs_failed_by_backend[&BackendId::Script], 2);
        assert_eq!(counters.jobs_failed_by_backend[&BackendId::RawDevice], 1);
        assert_eq!(counters.jobs_failed_total(), 3);
    }

    #[test]
    fn test_worker_faults_count_as_failures() {
        let mut counters = Counters::new();
        counters.worker_faults = 2;
        counters.record_failure(BackendId::Service);
        assert_eq!(counters.jobs_failed_total(), 3);
    }

    #[test]
    fn test_success_rate() {
        let mut counters = Counters::new();
        counters.jobs_emitted = 4;
        counters.jobs_succeeded = 3;
        let rate = counters.success_rate().unwrap();
        assert!((rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coalesce_rate() {
        let mut counters = Counters::new();
        counters.events_total = 10;
        counters.jobs_coalesced = 8;
        let rate = counters.coalesce_rate().unwrap();
        assert!((rate - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let mut counters = Counters::new();
        counters.events_total = 5;
        counters.record_failure(BackendId::Degraded);
        counters.reset();
        assert_eq!(counters, Counters::new());
    }

    #[test]
    fn test_counters_round_trip_json() {
        let mut counters = Counters::new();
        counters.events_total = 7;
        counters.record_failure(BackendId::Script);

        let json = serde_json::to_string(&counters).unwrap();
        let back: Counters = serde_json::from_str(&json).unwrap();
        assert_eq!(back, counters);
    }
}
