use std::collections::HashMap;

use larder_sync_core::{Snapshot, SnapshotPatch};
use tokio::sync::{watch, RwLock};

/// Document table plus live-update fan-out for one remote store.
///
/// Each document id maps to at most one [`Snapshot`] and any number of
/// watchers. A write merges a patch into the document and publishes the
/// merged result; watchers whose receivers are gone are pruned during
/// publish rather than tracked separately.
pub struct DocumentHub {
    state: RwLock<HubState>,
}

#[derive(Default)]
struct HubState {
    documents: HashMap<String, Snapshot>,
    watchers: HashMap<String, Vec<watch::Sender<Option<Snapshot>>>>,
}

impl DocumentHub {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HubState::default()),
        }
    }

    pub async fn read(&self, document_id: &str) -> Option<Snapshot> {
        let state = self.state.read().await;
        state.documents.get(document_id).cloned()
    }

    /// Merges a patch into a document, creating it if absent. Fields the
    /// patch leaves out keep their remote value, and `last_synced_at`
    /// never moves backwards. Publishes the merged document and returns it.
    pub async fn write(&self, document_id: &str, patch: &SnapshotPatch) -> Snapshot {
        let mut state = self.state.write().await;
        let mut document = state.documents.get(document_id).cloned().unwrap_or_default();

        let floor = document.last_synced_at;
        patch.apply_to(&mut document);
        document.last_synced_at = document.last_synced_at.max(floor);

        state
            .documents
            .insert(document_id.to_owned(), document.clone());
        Self::publish(&mut state, document_id, &document);
        document
    }

    /// Registers a watcher for a document. When the document already
    /// exists, the current snapshot is marked as a pending delivery so
    /// the watcher sees it immediately.
    pub async fn watch(&self, document_id: &str) -> watch::Receiver<Option<Snapshot>> {
        let mut state = self.state.write().await;
        let current = state.documents.get(document_id).cloned();
        let has_document = current.is_some();

        let (tx, mut rx) = watch::channel(current);
        if has_document {
            rx.mark_changed();
        }
        state
            .watchers
            .entry(document_id.to_owned())
            .or_default()
            .push(tx);
        rx
    }

    pub async fn watcher_count(&self, document_id: &str) -> usize {
        let state = self.state.read().await;
        state
            .watchers
            .get(document_id)
            .map(|watchers| {
                watchers
                    .iter()
                    .filter(|tx| tx.receiver_count() > 0)
                    .count()
            })
            .unwrap_or(0)
    }

    fn publish(state: &mut HubState, document_id: &str, document: &Snapshot) {
        let Some(watchers) = state.watchers.get_mut(document_id) else {
            return;
        };
        watchers.retain(|tx| tx.send(Some(document.clone())).is_ok());
        if watchers.is_empty() {
            state.watchers.remove(document_id);
        }
    }
}

impl Default for DocumentHub {
    fn default() -> Self {
        Self::new()
    }
}
