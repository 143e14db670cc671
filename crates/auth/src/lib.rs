#![forbid(unsafe_code)]

//! Identity boundary for the Larder sync engine: the provider trait the
//! session controller drives, an in-memory provider for tests and the
//! device simulator, and the persisted session preferences.

mod identity;
mod memory;
mod prefs;
mod provider;

pub use identity::{AuthError, FederatedProvider, Identity};
pub use memory::MemoryIdentityProvider;
pub use prefs::SessionPrefs;
pub use provider::IdentityProvider;
