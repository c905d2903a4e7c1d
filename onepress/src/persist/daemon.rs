//! Write-behind persistence daemon.
//!
//! Saving the snapshot is file I/O and has no business on the worker's hot
//! path. Producers hand a [`PersistedState`] to the cloneable
//! [`StateClient`] and move on; the [`StateDaemon`] drains the channel,
//! collapses bursts to the newest snapshot, and writes through the
//! [`StateStore`]. One final flush runs on shutdown so the file reflects
//! the last thing the pipeline knew.

use super::store::{PersistedState, StateStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fire-and-forget sender of state snapshots.
///
/// Cheap to clone. If the daemon is gone the send is silently dropped;
/// losing a snapshot write is strictly better than blocking the pipeline.
#[derive(Clone, Debug)]
pub struct StateClient {
    tx: mpsc::UnboundedSender<PersistedState>,
}

impl StateClient {
    /// Queues a snapshot for writing.
    #[inline]
    pub fn persist(&self, snapshot: PersistedState) {
        let _ = self.tx.send(snapshot);
    }
}

/// Owns the store and performs all writes.
pub struct StateDaemon {
    rx: mpsc::UnboundedReceiver<PersistedState>,
    store: StateStore,
}

impl StateDaemon {
    /// Creates the daemon and its client side.
    pub fn new(store: StateStore) -> (Self, StateClient) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx, store }, StateClient { tx })
    }

    /// Runs until shutdown, writing the newest queued snapshot at a time.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(path = %self.store.path().display(), "State daemon starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("State daemon shutting down");
                    break;
                }

                Some(snapshot) = self.rx.recv() => {
                    let snapshot = self.collapse(snapshot);
                    self.write(snapshot);
                }
            }
        }

        // Snapshots queued after the last write still make it to disk.
        let mut pending = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            pending = Some(snapshot);
        }
        if let Some(snapshot) = pending {
            self.write(snapshot);
        }
        debug!("State daemon stopped");
    }

    /// Drains queued snapshots, keeping only the newest.
    fn collapse(&mut self, first: PersistedState) -> PersistedState {
        let mut latest = first;
        while let Ok(snapshot) = self.rx.try_recv() {
            latest = snapshot;
        }
        latest
    }

    fn write(&self, mut snapshot: PersistedState) {
        snapshot.saved_at = chrono::Utc::now().to_rfc3339();
        if let Err(error) = self.store.save(&snapshot) {
            warn!(error = %error, "State save failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_client_send_without_daemon_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let (daemon, client) = StateDaemon::new(StateStore::in_directory(dir.path()));
        drop(daemon);
        client.persist(PersistedState::fresh());
    }

    #[tokio::test]
    async fn test_daemon_writes_and_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::in_directory(dir.path());
        let (daemon, client) = StateDaemon::new(store.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(daemon.run(shutdown.clone()));

        let mut snapshot = PersistedState::fresh();
        snapshot.counters.events_total = 1;
        client.persist(snapshot);
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.load().counters.events_total, 1);
        assert!(!store.load().saved_at.is_empty());
    }

    #[tokio::test]
    async fn test_burst_collapses_to_newest_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::in_directory(dir.path());
        let (daemon, client) = StateDaemon::new(store.clone());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(daemon.run(shutdown.clone()));

        for n in 1..=5 {
            let mut snapshot = PersistedState::fresh();
            snapshot.counters.events_total = n;
            client.persist(snapshot);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        // Whatever interleaving happened, the newest snapshot wins.
        assert_eq!(store.load().counters.events_total, 5);
    }
}
