//! Shared child-process plumbing for the process-backed backends.
//!
//! Runs one child to completion under a hard time limit, feeding it an
//! optional stdin payload and capturing stderr for failure detail. On
//! timeout the child is killed and reaped so no zombie outlives the
//! attempt.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// What a bounded child run produced.
pub(super) struct ProcessOutput {
    /// Exit status of the child.
    pub status: ExitStatus,
    /// Captured stderr, trimmed, lossily decoded.
    pub stderr: String,
}

/// How a bounded child run failed before producing an exit status.
#[derive(Debug)]
pub(super) enum RunError {
    /// The child could not be spawned. The io kind distinguishes a missing
    /// binary from other launch failures.
    Spawn(std::io::Error),
    /// The child outlived the limit and was killed.
    TimedOut,
    /// Waiting on the child failed at the OS level.
    Wait(std::io::Error),
}

/// Runs `command` to completion within `limit`.
///
/// `stdin_payload`, when given, is written to the child's stdin and the
/// pipe is closed so the child sees EOF. Stdout is discarded; these
/// backends speak through exit status and stderr only.
pub(super) async fn run_bounded(
    mut command: Command,
    stdin_payload: Option<Vec<u8>>,
    limit: Duration,
) -> Result<ProcessOutput, RunError> {
    command
        .stdin(if stdin_payload.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(RunError::Spawn)?;
    let stdin_pipe = child.stdin.take();
    let mut stderr_pipe = child.stderr.take();

    let bounded = tokio::time::timeout(limit, async {
        if let (Some(mut pipe), Some(payload)) = (stdin_pipe, stdin_payload) {
            // A child that exits without reading reports through its exit
            // status; the broken pipe here is not the interesting error.
            let _ = pipe.write_all(&payload).await;
            let _ = pipe.shutdown().await;
        }

        // Drain stderr concurrently with the wait so a chatty child can
        // never fill the pipe and stall.
        let mut captured = Vec::new();
        let (status, _) = tokio::join!(child.wait(), async {
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut captured).await;
            }
        });
        (status, captured)
    });

    match bounded.await {
        Ok((Ok(status), captured)) => Ok(ProcessOutput {
            status,
            stderr: String::from_utf8_lossy(&captured).trim().to_string(),
        }),
        Ok((Err(err), _)) => Err(RunError::Wait(err)),
        Err(_elapsed) => {
            // Kill and reap; a half-finished child must not linger.
            let _ = child.kill().await;
            let _ = child.wait().await;
            Err(RunError::TimedOut)
        }
    }
}
