//! Crash-safe persistence of counters and the last outcome.
//!
//! Two pieces:
//!
//! - [`StateStore`]: synchronous load/save of one JSON snapshot with
//!   atomic replace semantics and fail-open loading.
//! - [`StateDaemon`] / [`StateClient`]: a write-behind channel pair that
//!   keeps file I/O off the pipeline's hot path.
//!
//! The snapshot never causes a job to resume: a `Processing` worker state
//! found on disk only proves the previous process died mid-job.

mod daemon;
mod store;

pub use daemon::{StateClient, StateDaemon};
pub use store::{
    PersistedOutcome, PersistedState, PersistedWorkerState, StateStore, StateStoreError,
    STATE_FILE_NAME,
};
