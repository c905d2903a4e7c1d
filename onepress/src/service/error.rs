//! Service error types.

use std::io;
use thiserror::Error;

/// Errors that can occur while assembling or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// State directory could not be created or accessed.
    #[error("State directory error: {0}")]
    DirectoryError(#[from] io::Error),

    /// No Tokio runtime was available to host the daemons.
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}
