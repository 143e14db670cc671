use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use larder_sync_core::HouseholdId;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("household lookup failed: {0}")]
    Lookup(String),
}

/// Household membership lookup. Backed by whatever service owns the
/// account-to-household mapping; the engine only ever asks one question.
#[async_trait]
pub trait HouseholdDirectory: Send + Sync {
    /// The household a user belongs to, `None` for solo users.
    async fn household_for(&self, user_id: &str) -> Result<Option<HouseholdId>, DirectoryError>;
}

/// In-memory directory for tests and the device simulator.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    memberships: Mutex<HashMap<String, HouseholdId>>,
    offline: AtomicBool,
    lookups: AtomicU64,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&self, user_id: impl Into<String>, household: HouseholdId) {
        self.memberships
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.into(), household);
    }

    pub fn unassign(&self, user_id: &str) {
        self.memberships
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user_id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Number of lookups served so far, including failed ones.
    #[must_use]
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HouseholdDirectory for MemoryDirectory {
    async fn household_for(&self, user_id: &str) -> Result<Option<HouseholdId>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.offline.load(Ordering::Relaxed) {
            return Err(DirectoryError::Lookup("directory unreachable".to_owned()));
        }
        let memberships = self
            .memberships
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(memberships.get(user_id).copied())
    }
}
