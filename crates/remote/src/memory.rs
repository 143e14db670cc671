use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use larder_sync_core::{PartitionKey, Snapshot, SnapshotPatch};

use crate::hub::DocumentHub;
use crate::{RemoteError, RemoteGateway, Subscription};

/// One successful write as seen by the backend, kept for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub document_id: String,
    pub patch: SnapshotPatch,
}

/// In-memory remote store for tests and the device simulator. Documents
/// live in a [`DocumentHub`]; failure toggles simulate transport loss,
/// and every accepted write is recorded so tests can assert on push
/// traffic (how many, which regions, which partition).
pub struct MemoryRemote {
    hub: DocumentHub,
    offline: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<RecordedWrite>>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hub: DocumentHub::new(),
            offline: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Fails every operation while set, as if the network were gone.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Every write accepted so far, oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Direct document access for assertions, ignoring failure toggles.
    pub async fn document(&self, partition: &PartitionKey) -> Option<Snapshot> {
        self.hub.read(&partition.document_id()).await
    }

    /// Live watchers on a partition's document.
    pub async fn watcher_count(&self, partition: &PartitionKey) -> usize {
        self.hub.watcher_count(&partition.document_id()).await
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteGateway for MemoryRemote {
    async fn read(&self, partition: &PartitionKey) -> Result<Option<Snapshot>, RemoteError> {
        if self.offline.load(Ordering::Relaxed) || self.fail_reads.load(Ordering::Relaxed) {
            return Err(RemoteError::TransientRead(
                "remote store unreachable".to_owned(),
            ));
        }
        Ok(self.hub.read(&partition.document_id()).await)
    }

    async fn write(
        &self,
        partition: &PartitionKey,
        patch: SnapshotPatch,
    ) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::Relaxed) || self.fail_writes.load(Ordering::Relaxed) {
            return Err(RemoteError::TransientWrite(
                "remote store unreachable".to_owned(),
            ));
        }

        let document_id = partition.document_id();
        self.hub.write(&document_id, &patch).await;
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedWrite { document_id, patch });
        Ok(())
    }

    async fn subscribe(&self, partition: &PartitionKey) -> Result<Subscription, RemoteError> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(RemoteError::Subscribe(
                "remote store unreachable".to_owned(),
            ));
        }
        let rx = self.hub.watch(&partition.document_id()).await;
        Ok(Subscription::new(rx))
    }
}
