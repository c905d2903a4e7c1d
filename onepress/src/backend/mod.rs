//! Output backends and the ordered fallback chain.
//!
//! Every job is driven through the same chain until one backend produces
//! the output:
//!
//! ```text
//! ┌──────────────┐ fail ┌───────────────┐ fail ┌──────────────────┐ fail ┌─────────────────┐
//! │ ScriptBackend├─────►│ ServiceBackend├─────►│ RawDeviceBackend ├─────►│ DegradedBackend │
//! └──────┬───────┘      └───────┬───────┘      └────────┬─────────┘      └────────┬────────┘
//!        │ ok                   │ ok                    │ ok                      │ always ok
//!        ▼                      ▼                       ▼                         ▼
//!                    JobOutcome { backend_used = first success }
//! ```
//!
//! Backends are uniform behind [`OutputBackend`] and own their time limits.
//! A backend attempt, once started, always runs to completion or to its own
//! timeout; nothing cancels it mid-output. Every failed attempt is kept in
//! the outcome's attempt log so a fallback success still shows what broke.

mod chain;
mod degraded;
mod device;
mod process;
mod script;
mod service;

pub use chain::BackendChain;
pub use degraded::DegradedBackend;
pub use device::{RawDeviceBackend, DEFAULT_DEVICE_WRITE_TIMEOUT};
pub use script::{ScriptBackend, DEFAULT_SCRIPT_TIMEOUT};
pub use service::{ServiceBackend, DEFAULT_SERVICE_TIMEOUT};

use crate::job::{BackendId, ErrorKind, Job};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by [`OutputBackend::invoke`].
///
/// Boxing keeps the trait usable as `dyn OutputBackend` so the chain can
/// hold heterogeneous backends in one ordered list.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<BackendSuccess, BackendError>> + Send + 'a>>;

/// One way of getting a job's output into the world.
pub trait OutputBackend: Send + Sync {
    /// Stable identity used in outcomes, counters and logs.
    fn id(&self) -> BackendId;

    /// Produces the job's output, or fails within the backend's own time
    /// limit.
    fn invoke<'a>(&'a self, job: &'a Job) -> BackendFuture<'a>;
}

/// Evidence of a successful backend attempt.
#[derive(Clone, Debug)]
pub struct BackendSuccess {
    /// Human-readable note of what happened (exit status, bytes written).
    pub detail: String,
}

impl BackendSuccess {
    /// Creates a success record with the given detail.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Why one backend attempt failed.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The attempt exceeded the backend's time limit and was cut off.
    #[error("timed out after {}s", limit.as_secs())]
    Timeout {
        /// The limit that was exceeded.
        limit: Duration,
    },

    /// The delegate ran and reported failure (non-zero exit, bad response).
    #[error("{0}")]
    Process(String),

    /// The backend's binary, service or device node is not usable on this
    /// host.
    #[error("{0}")]
    DeviceUnavailable(String),

    /// A failure that fits no other bucket (signal death, platform errors).
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Classification recorded in the outcome's attempt log.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Timeout { .. } => ErrorKind::Timeout,
            BackendError::Process(_) => ErrorKind::Process,
            BackendError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            BackendError::Other(_) => ErrorKind::Unknown,
        }
    }
}

/// Renders the one-line payload handed to content-consuming backends.
///
/// The service backend pipes it to the spooler, the raw device backend
/// writes it to the device node, the degraded backend logs it.
pub fn render_payload(job: &Job) -> String {
    format!(
        "onepress {}: origin trigger #{}, {} further presses coalesced\n",
        job.job_id, job.origin_sequence, job.coalesced_count
    )
}
