#![forbid(unsafe_code)]

//! The sync engine for one device: a coordinator task that mirrors the
//! local stores into the partition's remote document and merges remote
//! deliveries back, plus the session controller that drives it from
//! identity transitions and user preferences.

use std::time::Duration;

mod coordinator;
mod merge;
mod resolver;
mod session;


pub use coordinator::SyncState;
pub use merge::apply_snapshot;
pub use resolver::{HouseholdResolver, ResolutionError};
pub use session::SessionController;

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a region's push is held back so a burst of mutations
    /// collapses into one write.
    pub debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}
