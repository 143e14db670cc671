#![forbid(unsafe_code)]

//! Remote document boundary: a gateway trait for per-partition snapshot
//! read/write/subscribe, the live subscription handle, the household
//! membership directory, and in-memory implementations of both backends.

use async_trait::async_trait;
use larder_sync_core::{PartitionKey, Snapshot, SnapshotPatch};
use tokio::sync::watch;

mod directory;
mod hub;
mod memory;

pub use directory::{DirectoryError, HouseholdDirectory, MemoryDirectory};
pub use hub::DocumentHub;
pub use memory::{MemoryRemote, RecordedWrite};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transient read failure: {0}")]
    TransientRead(String),
    #[error("transient write failure: {0}")]
    TransientWrite(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// Per-partition document store boundary.
///
/// `write` is a partial merge: fields the patch omits keep their remote
/// value. `read` distinguishes "never written" (`Ok(None)`) from
/// transport failure. A subscription delivers the current snapshot
/// immediately when the document exists, then again after every remote
/// change; deliveries triggered by this device's own writes come back
/// too and must be absorbed idempotently by the consumer.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn read(&self, partition: &PartitionKey) -> Result<Option<Snapshot>, RemoteError>;

    async fn write(
        &self,
        partition: &PartitionKey,
        patch: SnapshotPatch,
    ) -> Result<(), RemoteError>;

    async fn subscribe(&self, partition: &PartitionKey) -> Result<Subscription, RemoteError>;
}

/// Live-update handle for one partition. Holds the receiving half of a
/// watch channel, so bursts of remote writes coalesce into the latest
/// snapshot. Dropping or cancelling the handle is how the backend learns
/// the watcher is gone.
pub struct Subscription {
    rx: Option<watch::Receiver<Option<Snapshot>>>,
}

impl Subscription {
    #[must_use]
    pub fn new(rx: watch::Receiver<Option<Snapshot>>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Waits for the next delivery. Returns `None` once the subscription
    /// is cancelled or the backend is gone; after `cancel` it returns
    /// `None` immediately, even for deliveries already in flight.
    pub async fn next(&mut self) -> Option<Snapshot> {
        let rx = self.rx.as_mut()?;
        loop {
            if rx.changed().await.is_err() {
                return None;
            }
            let delivered = rx.borrow_and_update().clone();
            if let Some(snapshot) = delivered {
                return Some(snapshot);
            }
        }
    }

    /// Tears the subscription down. Safe to call any number of times.
    pub fn cancel(&mut self) {
        self.rx = None;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn next_after_cancel_returns_none() {
        let (tx, rx) = watch::channel(Some(Snapshot::default()));
        let mut subscription = Subscription::new(rx);

        subscription.cancel();
        subscription.cancel();
        assert!(subscription.is_cancelled());

        tx.send_replace(Some(Snapshot::default()));
        assert_eq!(subscription.next().await, None);
    }

    #[tokio::test]
    async fn next_skips_the_empty_seed_value() {
        let (tx, rx) = watch::channel(None);
        let mut subscription = Subscription::new(rx);

        let pending = tokio::spawn(async move { subscription.next().await });
        tx.send_replace(Some(Snapshot {
            last_synced_at: 7,
            ..Snapshot::default()
        }));

        let delivered = pending.await.expect("join").expect("snapshot");
        assert_eq!(delivered.last_synced_at, 7);
    }

    #[tokio::test]
    async fn next_returns_none_when_backend_drops() {
        let (tx, rx) = watch::channel(None);
        let mut subscription = Subscription::new(rx);
        drop(tx);
        assert_eq!(subscription.next().await, None);
    }
}
