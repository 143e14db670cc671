use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LocalStoreError {
    #[error("io error on slot {0}: {1}")]
    Io(String, String),
    #[error("slot {0} holds corrupt data: {1}")]
    Corrupt(String, String),
}

/// Durable key-value slots each store serializes its full state into.
/// One slot per store, rewritten after every mutation, read back once at
/// start. Implementations must tolerate concurrent calls from different
/// stores (distinct slots).
pub trait LocalStore: Send + Sync {
    fn load(&self, slot: &str) -> Result<Option<String>, LocalStoreError>;
    fn save(&self, slot: &str, payload: &str) -> Result<(), LocalStoreError>;
    fn remove(&self, slot: &str) -> Result<(), LocalStoreError>;
}

/// Decodes a slot's JSON payload, `None` when the slot was never written.
pub fn load_slot<T: DeserializeOwned>(
    local: &dyn LocalStore,
    slot: &str,
) -> Result<Option<T>, LocalStoreError> {
    match local.load(slot)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|error| LocalStoreError::Corrupt(slot.to_owned(), error.to_string())),
        None => Ok(None),
    }
}

/// Encodes `value` as JSON and writes it to a slot.
pub fn save_slot<T: Serialize>(
    local: &dyn LocalStore,
    slot: &str,
    value: &T,
) -> Result<(), LocalStoreError> {
    let payload = serde_json::to_string(value)
        .map_err(|error| LocalStoreError::Corrupt(slot.to_owned(), error.to_string()))?;
    local.save(slot, &payload)
}

/// Process-local slots, used in tests and as the no-persistence default.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn load(&self, slot: &str) -> Result<Option<String>, LocalStoreError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(slot).cloned())
    }

    fn save(&self, slot: &str, payload: &str) -> Result<(), LocalStoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(slot.to_owned(), payload.to_owned());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), LocalStoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(slot);
        Ok(())
    }
}

/// One JSON file per slot under a root directory. Writes go to a
/// temporary sibling first and are renamed into place, so a crash leaves
/// either the old payload or the new one, never a torn file.
#[derive(Debug)]
pub struct FileLocalStore {
    root: PathBuf,
}

impl FileLocalStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|error| LocalStoreError::Io(root.display().to_string(), error.to_string()))?;
        Ok(Self { root })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{slot}.json"))
    }
}

impl LocalStore for FileLocalStore {
    fn load(&self, slot: &str) -> Result<Option<String>, LocalStoreError> {
        match std::fs::read_to_string(self.slot_path(slot)) {
            Ok(payload) => Ok(Some(payload)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(LocalStoreError::Io(slot.to_owned(), error.to_string())),
        }
    }

    fn save(&self, slot: &str, payload: &str) -> Result<(), LocalStoreError> {
        let path = self.slot_path(slot);
        let temp = self
            .root
            .join(format!("{slot}.{}.tmp", Uuid::new_v4().simple()));
        std::fs::write(&temp, payload)
            .map_err(|error| LocalStoreError::Io(slot.to_owned(), error.to_string()))?;
        std::fs::rename(&temp, &path)
            .map_err(|error| LocalStoreError::Io(slot.to_owned(), error.to_string()))
    }

    fn remove(&self, slot: &str) -> Result<(), LocalStoreError> {
        match std::fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(LocalStoreError::Io(slot.to_owned(), error.to_string())),
        }
    }
}
