use std::sync::Arc;

use larder_sync_auth::{AuthError, FederatedProvider, Identity, IdentityProvider, SessionPrefs};
use larder_sync_core::SyncRegion;
use larder_sync_remote::{HouseholdDirectory, RemoteGateway};
use larder_sync_stores::{LocalStore, StoreSet};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::coordinator::{Coordinator, EngineEvent, SyncState};
use crate::resolver::HouseholdResolver;
use crate::EngineConfig;

/// Public face of the sync engine on one device.
///
/// Owns the coordinator task and wraps the identity provider, so callers
/// have a single handle for auth operations, sync preferences and state
/// observation. Auth results come back to the caller directly; the sync
/// session reacting to the new identity happens on the coordinator task,
/// observable through [`Self::watch_state`].
pub struct SessionController {
    provider: Arc<dyn IdentityProvider>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    state_rx: watch::Receiver<SyncState>,
    prefs_rx: watch::Receiver<SessionPrefs>,
    busy_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionController {
    /// Spawns the coordinator over one device's parts. `mutations` is
    /// the receiving half of the push hook the stores were opened with.
    pub fn start(
        config: EngineConfig,
        stores: StoreSet,
        local: Arc<dyn LocalStore>,
        provider: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn RemoteGateway>,
        directory: Arc<dyn HouseholdDirectory>,
        mutations: mpsc::UnboundedReceiver<SyncRegion>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SyncState::Idle);
        let (prefs_tx, prefs_rx) = watch::channel(SessionPrefs::default());
        let (busy_tx, _) = watch::channel(false);

        let coordinator = Coordinator::new(
            config,
            stores,
            local,
            gateway,
            HouseholdResolver::new(directory),
            mutations,
            events_tx.clone(),
            state_tx,
            prefs_tx,
        );
        let identities = provider.identity_changes();
        let task = tokio::spawn(coordinator.run(events_rx, identities));

        Self {
            provider,
            events_tx,
            state_rx,
            prefs_rx,
            busy_tx,
            task,
        }
    }

    // Auth operations. Each forwards to the provider and flips the busy
    // flag around the call; failures leave the flag cleared and the
    // session untouched.

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.busy_tx.send_replace(true);
        let result = self.provider.sign_in(email, password).await;
        self.busy_tx.send_replace(false);
        result
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        self.busy_tx.send_replace(true);
        let result = self.provider.sign_up(email, password, display_name).await;
        self.busy_tx.send_replace(false);
        result
    }

    pub async fn sign_in_federated(
        &self,
        federated: FederatedProvider,
        subject: &str,
    ) -> Result<Identity, AuthError> {
        self.busy_tx.send_replace(true);
        let result = self.provider.sign_in_federated(federated, subject).await;
        self.busy_tx.send_replace(false);
        result
    }

    /// Signs out. Local store contents stay on the device; the sync
    /// marker is cleared so the next sign-in starts from a clean slate.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.busy_tx.send_replace(true);
        let result = self.provider.sign_out().await;
        self.busy_tx.send_replace(false);
        result
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.provider.current_identity()
    }

    // Observation.

    #[must_use]
    pub fn sync_state(&self) -> SyncState {
        *self.state_rx.borrow()
    }

    /// Sync lifecycle transitions as a watch stream.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state_rx.clone()
    }

    /// True while an auth operation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.busy_tx.borrow()
    }

    #[must_use]
    pub fn watch_busy(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    #[must_use]
    pub fn prefs(&self) -> SessionPrefs {
        self.prefs_rx.borrow().clone()
    }

    /// When this device last pushed or merged, as epoch milliseconds.
    /// `None` before the first sync and after sign-out.
    #[must_use]
    pub fn last_synced_at(&self) -> Option<i64> {
        self.prefs_rx.borrow().last_synced_at
    }

    #[must_use]
    pub fn sync_enabled(&self) -> bool {
        self.prefs_rx.borrow().sync_enabled
    }

    // Preference and membership changes, handled on the coordinator task.

    pub fn set_sync_enabled(&self, enabled: bool) {
        let _ = self.events_tx.send(EngineEvent::SetSyncEnabled(enabled));
    }

    /// Re-resolves household membership and re-syncs against whatever
    /// partition comes back. Call after the user joins or leaves a
    /// household.
    pub fn refresh_partition(&self) {
        let _ = self.events_tx.send(EngineEvent::RefreshPartition);
    }

    /// Stops the coordinator task and waits for it to finish. Pending
    /// debounce windows are abandoned; local data stays on the device.
    pub async fn shutdown(self) {
        let _ = self.events_tx.send(EngineEvent::Shutdown);
        let _ = self.task.await;
    }
}
