//! Metrics collection and reporting.
//!
//! This module provides a 3-layer architecture for the pipeline's counters:
//!
//! 1. **Emission Layer** ([`MetricsClient`]) - Fire-and-forget event emission
//! 2. **Aggregation Layer** ([`MetricsDaemon`]) - Independent event processing
//! 3. **Reporting Layer** ([`SharedMetricsState`]) - Read-only snapshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  EMISSION LAYER                                                      │
//! │  MetricsClient (cloneable, cheap, fire-and-forget)                  │
//! │  - Used by: EventCoalescer, SingleFlightWorker                      │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ MetricEvent (mpsc channel)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  AGGREGATION LAYER                                                   │
//! │  MetricsDaemon (independent async task)                              │
//! │  - Receives events from the channel                                  │
//! │  - Updates the Counters ledger, tracks worker state                 │
//! │  - Forwards persistable snapshots to the state daemon               │
//! └──────────────────────────────┬──────────────────────────────────────┘
//!                                │ read-only snapshot (RwLock)
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  REPORTING LAYER                                                     │
//! │  SharedMetricsState handle                                           │
//! │  - Read by status reporting and the CLI run loop                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use onepress::metrics::MetricsRegistry;
//! use onepress::persist::PersistedState;
//!
//! let registry = MetricsRegistry::new(
//!     &tokio::runtime::Handle::current(),
//!     PersistedState::fresh(),
//!     true,
//!     None,
//! );
//!
//! let client = registry.client();
//! client.trigger_observed();
//!
//! let snapshot = registry.snapshot();
//! println!("events so far: {}", snapshot.counters.events_total);
//!
//! registry.shutdown().await;
//! ```

mod client;
mod daemon;
mod event;
mod state;

pub use client::MetricsClient;
pub use daemon::{MetricsDaemon, MetricsSnapshot, SharedMetricsState};
pub use event::MetricEvent;
pub use state::Counters;

use crate::job::{JobOutcome, WorkerState};
use crate::persist::{PersistedState, StateClient};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Metrics Registry
// =============================================================================

/// The complete metrics system.
///
/// Top-level factory that creates and manages the emission and aggregation
/// layers. It provides:
///
/// - A [`MetricsClient`] for emitting events
/// - Access to counter snapshots for reporting
/// - Graceful shutdown coordination
pub struct MetricsRegistry {
    /// Client for emitting events.
    client: MetricsClient,

    /// Handle to the shared state for reporters.
    state_handle: SharedMetricsState,

    /// Handle to the daemon task.
    daemon_handle: Option<JoinHandle<()>>,

    /// Shutdown signal for the daemon.
    shutdown: CancellationToken,
}

impl MetricsRegistry {
    /// Creates the registry and starts the aggregation daemon.
    ///
    /// The daemon runs as an async task on the provided runtime and keeps
    /// processing events until [`shutdown`](Self::shutdown) is called.
    ///
    /// # Arguments
    ///
    /// * `runtime_handle` - Tokio runtime to spawn the daemon on
    /// * `seed` - Persisted state from the previous run; counters continue
    /// * `degraded_counts_as_success` - Counter policy for degraded outcomes
    /// * `state_client` - Write-behind persistence destination, if wired
    pub fn new(
        runtime_handle: &tokio::runtime::Handle,
        seed: PersistedState,
        degraded_counts_as_success: bool,
        state_client: Option<StateClient>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = MetricsClient::new(tx);

        let daemon = MetricsDaemon::new(rx, seed, degraded_counts_as_success, state_client);
        let state_handle = daemon.state_handle();
        let shutdown = CancellationToken::new();

        let daemon_shutdown = shutdown.clone();
        let daemon_handle = Some(runtime_handle.spawn(async move {
            daemon.run(daemon_shutdown).await;
        }));

        Self {
            client,
            state_handle,
            daemon_handle,
            shutdown,
        }
    }

    /// Returns a clone of the metrics client.
    ///
    /// The client is cheaply cloneable and can be distributed to every
    /// pipeline component.
    pub fn client(&self) -> MetricsClient {
        self.client.clone()
    }

    /// Returns a handle to the shared metrics state.
    pub fn state_handle(&self) -> SharedMetricsState {
        Arc::clone(&self.state_handle)
    }

    /// Returns a snapshot of the current counters and worker state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state_handle
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Shuts down the registry gracefully.
    ///
    /// Signals the daemon to stop and waits for its final state update.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.daemon_handle.take() {
            let _ = handle.await;
        }
    }

    /// Returns true if the daemon is still running.
    pub fn is_running(&self) -> bool {
        self.daemon_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("running", &self.is_running())
            .finish()
    }
}

// =============================================================================
// Optional Metrics Client
// =============================================================================

/// Extension trait for optional metrics client usage.
///
/// This allows components to work with `Option<MetricsClient>` without
/// verbose match statements.
pub trait OptionalMetrics {
    fn trigger_observed(&self);
    fn job_emitted(&self);
    fn job_coalesced(&self);
    fn worker_state_changed(&self, state: WorkerState);
    fn job_completed(&self, outcome: JobOutcome);
}

impl OptionalMetrics for Option<MetricsClient> {
    #[inline]
    fn trigger_observed(&self) {
        if let Some(client) = self {
            client.trigger_observed();
        }
    }

    #[inline]
    fn job_emitted(&self) {
        if let Some(client) = self {
            client.job_emitted();
        }
    }

    #[inline]
    fn job_coalesced(&self) {
        if let Some(client) = self {
            client.job_coalesced();
        }
    }

    #[inline]
    fn worker_state_changed(&self, state: WorkerState) {
        if let Some(client) = self {
            client.worker_state_changed(state);
        }
    }

    #[inline]
    fn job_completed(&self, outcome: JobOutcome) {
        if let Some(client) = self {
            client.job_completed(outcome);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
