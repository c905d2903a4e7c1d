//! On-disk snapshot of counters and the last outcome.
//!
//! One JSON file holds everything that survives a restart. Saves are
//! atomic: the snapshot is written to a temp file in the same directory
//! and renamed over the old one, so a crash mid-save leaves either the
//! old or the new file, never a torn one.
//!
//! Loads fail open. A missing file yields a fresh state; an unreadable or
//! corrupt file is logged loudly and also yields a fresh state. Startup
//! never refuses to run because of the state file.

use crate::job::{BackendId, FailureKind, JobOutcome};
use crate::metrics::Counters;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Name of the snapshot file inside the state directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Errors from saving the snapshot.
///
/// Loading has no error type: corruption and I/O failures fail open.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// The state directory could not be created.
    #[error("failed to create state directory {path}: {source}")]
    Directory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot could not be written or renamed into place.
    #[error("failed to write state file {path}: {source}")]
    Write {
        /// Final path of the snapshot.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// Persisted types
// =============================================================================

/// Worker state as recorded at save time.
///
/// Only ever informational on load: a `Processing` value means the process
/// died mid-job, and the interrupted job is discarded, not resumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedWorkerState {
    /// No job was in flight.
    #[default]
    Idle,
    /// A job was in flight when the snapshot was taken.
    Processing {
        /// The in-flight job's ID.
        job_id: u64,
    },
}

/// Terminal record of the most recent completed job, in storable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedOutcome {
    /// Numeric job ID; seeds the allocator on the next startup.
    pub job_id: u64,

    /// Backend that produced the output, when one did.
    pub backend_used: Option<BackendId>,

    /// Whether the job produced an output.
    pub success: bool,

    /// True when the output came from the always-succeeds fallback.
    pub degraded: bool,

    /// Why the job failed, when it did.
    pub error_kind: Option<FailureKind>,

    /// Wall time from dequeue to terminal outcome, in milliseconds.
    pub duration_ms: u64,

    /// RFC 3339 completion timestamp (wall clock, for humans).
    pub completed_at: String,
}

impl PersistedOutcome {
    /// Converts a live outcome into its storable form, stamped now.
    pub fn from_outcome(outcome: &JobOutcome) -> Self {
        Self {
            job_id: outcome.job_id.as_u64(),
            backend_used: outcome.backend_used,
            success: outcome.success,
            degraded: outcome.degraded,
            error_kind: outcome.error,
            duration_ms: outcome.duration.as_millis() as u64,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Everything that survives a restart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// The counter ledger.
    pub counters: Counters,

    /// The most recent terminal outcome, if any job ever completed.
    pub last_outcome: Option<PersistedOutcome>,

    /// Worker state at save time. Never restored as `Processing`.
    pub worker_state_at_save: PersistedWorkerState,

    /// RFC 3339 save timestamp.
    pub saved_at: String,
}

impl PersistedState {
    /// A fresh state with zeroed counters and no history.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// The first job ID the allocator may hand out after loading this state.
    ///
    /// Job IDs stay strictly increasing across restarts by skipping past
    /// the last terminal job's ID.
    pub fn next_job_id(&self) -> u64 {
        match &self.last_outcome {
            Some(outcome) => outcome.job_id + 1,
            None => 1,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Reads and writes the persisted snapshot.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Creates a store for an explicit snapshot path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for the default file name inside `directory`.
    pub fn in_directory(directory: &Path) -> Self {
        Self::new(directory.join(STATE_FILE_NAME))
    }

    /// Returns the snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot, failing open on every problem.
    ///
    /// A persisted `Processing` worker state is logged and normalized to
    /// `Idle`; the interrupted job never resurfaces.
    pub fn load(&self) -> PersistedState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file, starting fresh");
                return PersistedState::fresh();
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "State file unreadable, resetting counters"
                );
                return PersistedState::fresh();
            }
        };

        let mut state: PersistedState = match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "State file corrupt, resetting counters"
                );
                return PersistedState::fresh();
            }
        };

        if let PersistedWorkerState::Processing { job_id } = state.worker_state_at_save {
            warn!(
                job_id = job_id,
                "Previous run died mid-job; the interrupted job is discarded"
            );
            state.worker_state_at_save = PersistedWorkerState::Idle;
        }

        debug!(
            path = %self.path.display(),
            jobs_emitted = state.counters.jobs_emitted,
            "Loaded persisted state"
        );
        state
    }

    /// Saves the snapshot atomically (temp file + rename).
    pub fn save(&self, state: &PersistedState) -> Result<(), StateStoreError> {
        let directory = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory).map_err(|source| StateStoreError::Directory {
            path: directory.to_path_buf(),
            source,
        })?;

        let json = serde_json::to_string_pretty(state)?;

        let mut tmp =
            NamedTempFile::new_in(directory).map_err(|source| StateStoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| StateStoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        tmp.persist(&self.path)
            .map_err(|e| StateStoreError::Write {
                path: self.path.clone(),
                source: e.error,
            })?;

        debug!(path = %self.path.display(), "Saved state snapshot");
        Ok(())
    }
}
