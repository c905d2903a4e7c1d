//! OnePress service facade implementation.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::ServiceError;
use crate::backend::{
    BackendChain, DegradedBackend, OutputBackend, RawDeviceBackend, ScriptBackend, ServiceBackend,
    DEFAULT_DEVICE_WRITE_TIMEOUT,
};
use crate::coalescer::{CoalescerConfig, EventCoalescer};
use crate::config::{BackendSettings, ConfigFile};
use crate::job::{BackendId, JobId};
use crate::metrics::{MetricsRegistry, MetricsSnapshot, SharedMetricsState};
use crate::persist::{PersistedState, StateDaemon, StateStore};
use crate::queue::JobQueue;
use crate::trigger::TriggerHandle;
use crate::worker::SingleFlightWorker;

/// High-level facade over the whole press pipeline.
///
/// Encapsulates all component creation and wiring: persisted state load
/// and job id seeding, the metrics registry, the queue, coalescer, worker,
/// and the backend chain assembled from configuration.
///
/// # Example
///
/// ```ignore
/// use onepress::config::ConfigFile;
/// use onepress::service::OnePressService;
/// use tokio_util::sync::CancellationToken;
///
/// let config = ConfigFile::load()?;
/// let service = OnePressService::new(config)?;
/// let trigger = service.trigger();
///
/// let shutdown = CancellationToken::new();
/// tokio::spawn(service.run(shutdown.clone()));
///
/// trigger.press();
/// ```
pub struct OnePressService {
    /// Entry point for trigger sources.
    trigger: TriggerHandle,
    /// Metrics system (daemon already running).
    metrics: MetricsRegistry,
    /// The worker, consumed by [`run`](Self::run).
    worker: SingleFlightWorker,
    /// Write-behind persistence daemon, spawned by [`run`](Self::run).
    state_daemon: Option<StateDaemon>,
    /// Chain composition, in invocation order.
    backend_ids: Vec<BackendId>,
}

impl OnePressService {
    /// Create a new service from configuration.
    ///
    /// Prepares the state directory, loads the persisted snapshot (fail-open),
    /// seeds the job id counter past the previous run, and wires every
    /// pipeline component. The metrics daemon starts immediately; the worker
    /// and state daemon start in [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created or if no
    /// Tokio runtime is available to host the daemons.
    pub fn new(config: ConfigFile) -> Result<Self, ServiceError> {
        let handle =
            Handle::try_current().map_err(|e| ServiceError::RuntimeError(e.to_string()))?;

        fs::create_dir_all(&config.state.directory)?;
        let store = StateStore::in_directory(&config.state.directory);

        let chain = chain_from_settings(&config.backends);

        Ok(Self::assemble(
            (&config.coalescer).into(),
            chain,
            Some(store),
            config.backends.degraded_counts_as_success,
            handle,
        ))
    }

    /// Wires the pipeline from already-built parts.
    ///
    /// With no store the service runs purely in memory: counters start
    /// fresh and nothing is written on shutdown.
    pub(super) fn assemble(
        coalescer_config: CoalescerConfig,
        chain: BackendChain,
        store: Option<StateStore>,
        degraded_counts_as_success: bool,
        handle: Handle,
    ) -> Self {
        let (seed, state_client, state_daemon) = match store {
            Some(store) => {
                let seed = store.load();
                let (daemon, client) = StateDaemon::new(store);
                (seed, Some(client), Some(daemon))
            }
            None => (PersistedState::fresh(), None, None),
        };

        // New job ids continue after anything the previous run handed out.
        JobId::seed(seed.next_job_id());

        let metrics = MetricsRegistry::new(&handle, seed, degraded_counts_as_success, state_client);

        if chain.is_empty() {
            warn!("No output backend configured, every job will be recorded as lost");
        }
        let backend_ids = chain.backend_ids();

        let queue = Arc::new(JobQueue::new());
        let worker = SingleFlightWorker::new(
            Arc::clone(&queue),
            Arc::new(chain),
            Some(metrics.client()),
        );
        let coalescer = Arc::new(EventCoalescer::new(
            coalescer_config,
            queue,
            worker.state_receiver(),
            Some(metrics.client()),
        ));
        let trigger = TriggerHandle::new(coalescer);

        Self {
            trigger,
            metrics,
            worker,
            state_daemon,
            backend_ids,
        }
    }

    /// Returns a handle trigger sources press on.
    pub fn trigger(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    /// Returns the shared metrics state for reporters.
    pub fn metrics(&self) -> SharedMetricsState {
        self.metrics.state_handle()
    }

    /// Returns a snapshot of the current counters and worker state.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns the backend chain composition, in invocation order.
    pub fn backend_ids(&self) -> &[BackendId] {
        &self.backend_ids
    }

    /// Drives the pipeline until `shutdown` is cancelled.
    ///
    /// Cancellation is graceful: the worker finishes its in-flight job, the
    /// metrics daemon counts that final outcome, and the state daemon writes
    /// the resulting snapshot before this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let OnePressService {
            metrics,
            worker,
            state_daemon,
            backend_ids,
            ..
        } = self;

        info!(
            version = crate::VERSION,
            backends = ?backend_ids,
            "OnePress service starting"
        );

        // The state daemon outlives the worker and the metrics daemon so the
        // final forwarded snapshot still lands on disk.
        let state_token = CancellationToken::new();
        let state_task =
            state_daemon.map(|daemon| tokio::spawn(daemon.run(state_token.clone())));

        worker.run(shutdown).await;

        metrics.shutdown().await;
        state_token.cancel();
        if let Some(task) = state_task {
            let _ = task.await;
        }

        info!("OnePress service stopped");
    }
}

impl std::fmt::Debug for OnePressService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnePressService")
            .field("backends", &self.backend_ids)
            .finish_non_exhaustive()
    }
}

/// Assembles the output chain from configuration, in fixed order:
/// script, then spooler service, then raw device, then degraded.
fn chain_from_settings(settings: &BackendSettings) -> BackendChain {
    let mut backends: Vec<Box<dyn OutputBackend>> = Vec::new();

    if let Some(path) = &settings.script_path {
        backends.push(Box::new(ScriptBackend::new(
            path,
            Duration::from_secs(settings.script_timeout_secs),
        )));
    }

    if let Some(service) = ServiceBackend::from_command_line(
        &settings.service_command,
        Duration::from_secs(settings.service_timeout_secs),
    ) {
        backends.push(Box::new(service));
    }

    if !settings.device_paths.is_empty() {
        backends.push(Box::new(RawDeviceBackend::new(
            settings.device_paths.clone(),
            DEFAULT_DEVICE_WRITE_TIMEOUT,
        )));
    }

    if settings.enable_degraded {
        backends.push(Box::new(DegradedBackend::default()));
    }

    BackendChain::new(backends)
}
