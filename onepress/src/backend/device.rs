//! Raw device-node backend, third in the chain.

use super::{render_payload, BackendError, BackendFuture, BackendSuccess, OutputBackend};
use crate::job::{BackendId, Job};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Time limit for opening and writing the device node.
///
/// A device with no consumer (paper out, printer off) can block a write
/// indefinitely; the limit keeps the attempt bounded.
pub const DEFAULT_DEVICE_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Writes the job payload straight to the first device node that exists.
///
/// Candidates are tried in the configured order; only presence is probed,
/// so a node that exists but rejects the write fails the attempt rather
/// than falling through to a later candidate.
pub struct RawDeviceBackend {
    candidates: Vec<PathBuf>,
    write_timeout: Duration,
}

impl RawDeviceBackend {
    /// Creates a device backend over an ordered candidate list.
    pub fn new(candidates: Vec<PathBuf>, write_timeout: Duration) -> Self {
        Self {
            candidates,
            write_timeout,
        }
    }

    /// The candidate device paths, in probe order.
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    async fn first_existing(&self) -> Option<&PathBuf> {
        for candidate in &self.candidates {
            if tokio::fs::try_exists(candidate).await.unwrap_or(false) {
                return Some(candidate);
            }
        }
        None
    }
}

impl OutputBackend for RawDeviceBackend {
    fn id(&self) -> BackendId {
        BackendId::RawDevice
    }

    fn invoke<'a>(&'a self, job: &'a Job) -> BackendFuture<'a> {
        Box::pin(async move {
            let path = self.first_existing().await.ok_or_else(|| {
                BackendError::DeviceUnavailable(format!(
                    "no device node present out of {} candidates",
                    self.candidates.len()
                ))
            })?;

            debug!(
                job_id = %job.job_id,
                device = %path.display(),
                "Writing job to raw device"
            );

            let payload = render_payload(job).into_bytes();
            let write = async {
                // No create flag: the node must already exist, a regular
                // file materializing here would hide a missing device.
                let mut file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .open(path)
                    .await?;
                file.write_all(&payload).await?;
                file.flush().await?;
                Ok::<usize, std::io::Error>(payload.len())
            };

            match tokio::time::timeout(self.write_timeout, write).await {
                Ok(Ok(written)) => Ok(BackendSuccess::new(format!(
                    "wrote {} bytes to {}",
                    written,
                    path.display()
                ))),
                Ok(Err(err)) => Err(BackendError::DeviceUnavailable(format!(
                    "{}: {}",
                    path.display(),
                    err
                ))),
                Err(_elapsed) => Err(BackendError::Timeout {
                    limit: self.write_timeout,
                }),
            }
        })
    }
}

impl std::fmt::Debug for RawDeviceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDeviceBackend")
            .field("candidates", &self.candidates)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
