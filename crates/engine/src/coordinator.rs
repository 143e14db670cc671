use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use larder_sync_auth::{Identity, SessionPrefs};
use larder_sync_core::{now_millis, PartitionKey, Snapshot, SnapshotPatch, SyncRegion};
use larder_sync_remote::{RemoteGateway, Subscription};
use larder_sync_stores::{load_slot, save_slot, LocalStore, StoreSet};
use tokio::sync::{mpsc, watch};

use crate::merge;
use crate::resolver::HouseholdResolver;
use crate::EngineConfig;

/// Slot holding the persisted session preferences.
const PREFS_SLOT: &str = "session";

/// Where the engine is in its lifecycle, observed through
/// [`crate::SessionController::watch_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No session: signed out, sync disabled, or not yet started.
    #[default]
    Idle,
    /// Working out which partition this identity syncs against.
    Resolving,
    /// Fetching and merging the remote document, or seeding it.
    Pulling,
    /// Steady state: mutations push out, deliveries merge in.
    Live,
}

impl SyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Pulling => "pulling",
            Self::Live => "live",
        }
    }
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the coordinator reacts to besides identity transitions,
/// mutations and deliveries, which arrive on their own channels.
#[derive(Debug)]
pub(crate) enum EngineEvent {
    /// The user toggled the sync preference.
    SetSyncEnabled(bool),
    /// Drop the cached partition, re-resolve and re-pull. Sent after
    /// the user joins or leaves a household.
    RefreshPartition,
    /// A region's debounce window elapsed.
    Flush {
        generation: u64,
        region: SyncRegion,
    },
    /// Stop syncing and exit the event loop.
    Shutdown,
}

/// One device's sync engine. A single task owns this state and consumes
/// every input serially, so session teardown is atomic with respect to
/// deliveries and flushes: once a session ends here, nothing scheduled
/// under it can touch the stores or the remote again.
pub(crate) struct Coordinator {
    config: EngineConfig,
    stores: StoreSet,
    local: Arc<dyn LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    resolver: HouseholdResolver,

    identity: Option<Identity>,
    partition: Option<PartitionKey>,
    subscription: Option<Subscription>,
    /// Bumped on every teardown; flush timers scheduled under an older
    /// generation are ignored when they fire.
    generation: u64,
    /// Regions with a flush timer in flight.
    pending: HashSet<SyncRegion>,
    prefs: SessionPrefs,

    mutations: mpsc::UnboundedReceiver<SyncRegion>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    state_tx: watch::Sender<SyncState>,
    prefs_tx: watch::Sender<SessionPrefs>,
}

impl Coordinator {
    pub(crate) fn new(
        config: EngineConfig,
        stores: StoreSet,
        local: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        resolver: HouseholdResolver,
        mutations: mpsc::UnboundedReceiver<SyncRegion>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
        state_tx: watch::Sender<SyncState>,
        prefs_tx: watch::Sender<SessionPrefs>,
    ) -> Self {
        let prefs = match load_slot::<SessionPrefs>(local.as_ref(), PREFS_SLOT) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => SessionPrefs::default(),
            Err(error) => {
                tracing::warn!(%error, slot = PREFS_SLOT, "failed to load session prefs, using defaults");
                SessionPrefs::default()
            }
        };
        prefs_tx.send_replace(prefs.clone());

        Self {
            config,
            stores,
            local,
            gateway,
            resolver,
            identity: None,
            partition: None,
            subscription: None,
            generation: 0,
            pending: HashSet::new(),
            prefs,
            mutations,
            events_tx,
            state_tx,
            prefs_tx,
        }
    }

    /// The event loop. Runs until shutdown is requested or every input
    /// channel closes.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        mut identities: watch::Receiver<Option<Identity>>,
    ) {
        // The provider may have restored a session before the engine
        // started; catch up instead of waiting for the next transition.
        let restored = identities.borrow_and_update().clone();
        if restored.is_some() {
            self.handle_identity(restored).await;
        }

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        EngineEvent::SetSyncEnabled(enabled) => {
                            self.handle_set_sync_enabled(enabled).await;
                        }
                        EngineEvent::RefreshPartition => self.handle_refresh().await,
                        EngineEvent::Flush { generation, region } => {
                            self.handle_flush(generation, region).await;
                        }
                        EngineEvent::Shutdown => break,
                    }
                }
                changed = identities.changed() => {
                    if changed.is_err() {
                        // Provider gone; nothing is left to drive a session.
                        break;
                    }
                    let identity = identities.borrow_and_update().clone();
                    self.handle_identity(identity).await;
                }
                region = self.mutations.recv() => {
                    let Some(region) = region else { break };
                    self.handle_mutation(region);
                }
                delivered = next_delivery(&mut self.subscription) => {
                    match delivered {
                        Some(snapshot) => self.handle_delivery(&snapshot),
                        None => {
                            tracing::warn!("live subscription ended by the remote");
                            self.subscription = None;
                        }
                    }
                }
            }
        }

        self.stop_session();
        self.set_state(SyncState::Idle);
    }

    async fn handle_identity(&mut self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                let same_user = self
                    .identity
                    .as_ref()
                    .is_some_and(|current| current.user_id == identity.user_id);
                if same_user {
                    // Profile metadata may have changed; the session has not.
                    self.identity = Some(identity);
                    return;
                }

                if self.identity.is_some() {
                    tracing::info!(user = %identity.user_id, "switching accounts");
                    self.stop_session();
                    // The marker must never show another account's sync time.
                    self.prefs.last_synced_at = None;
                    self.persist_prefs();
                }
                self.identity = Some(identity);
                self.start_session().await;
            }
            None => {
                if self.identity.take().is_none() {
                    return;
                }
                tracing::info!("signed out, local data stays on this device");
                self.stop_session();
                self.prefs.last_synced_at = None;
                self.persist_prefs();
                self.set_state(SyncState::Idle);
            }
        }
    }

    /// Brings a session up for the current identity: resolve the
    /// partition, pull-and-merge (or seed), then subscribe. Runs inline
    /// so everything queued behind it observes the finished session.
    async fn start_session(&mut self) {
        let Some(identity) = self.identity.clone() else {
            self.set_state(SyncState::Idle);
            return;
        };
        if !self.prefs.sync_enabled {
            tracing::debug!(user = %identity.user_id, "sync disabled, staying idle");
            self.set_state(SyncState::Idle);
            return;
        }

        self.set_state(SyncState::Resolving);
        let partition = match self.resolver.resolve(&identity).await {
            Ok(partition) => partition,
            Err(error) => {
                let fallback = self.resolver.fall_back_to_personal(&identity);
                tracing::warn!(
                    %error,
                    partition = %fallback,
                    "household lookup failed, syncing the personal partition"
                );
                fallback
            }
        };
        tracing::debug!(user = %identity.user_id, %partition, "partition resolved");
        self.partition = Some(partition);

        self.set_state(SyncState::Pulling);
        self.pull(partition).await;

        match self.gateway.subscribe(&partition).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(error) => {
                tracing::warn!(%error, "subscribe failed, pushing without live updates");
            }
        }

        // Mutation notices queued while no session was live are stale:
        // the pull above already reconciled the stores with the remote.
        while self.mutations.try_recv().is_ok() {}
        self.set_state(SyncState::Live);
    }

    /// Tears the live session down: cancels the subscription, forgets
    /// the partition and abandons pending flushes. Store contents stay.
    fn stop_session(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.partition = None;
        self.pending.clear();
        self.resolver.invalidate();
    }

    /// First contact with the partition's document. A missing document
    /// means this account has never synced: local state seeds it without
    /// merging. A present document merges into the stores. A transport
    /// failure falls through to seeding so sign-in never blocks on the
    /// remote; the next delivery straightens things out.
    async fn pull(&mut self, partition: PartitionKey) {
        match self.gateway.read(&partition).await {
            Ok(Some(snapshot)) => {
                merge::apply_snapshot(&self.stores, &snapshot);
                self.prefs.last_synced_at = Some(snapshot.last_synced_at);
                self.persist_prefs();
                tracing::info!(%partition, "merged remote document");
            }
            Ok(None) => {
                tracing::info!(%partition, "no remote document yet, seeding from local");
                self.push_full(partition).await;
            }
            Err(error) => {
                tracing::warn!(%error, %partition, "pull failed, seeding from local");
                self.push_full(partition).await;
            }
        }
    }

    async fn push_full(&mut self, partition: PartitionKey) {
        let mut aggregate = self.stores.aggregate();
        let pushed_at = now_millis();
        aggregate.last_synced_at = pushed_at;

        match self
            .gateway
            .write(&partition, SnapshotPatch::full(aggregate))
            .await
        {
            Ok(()) => {
                self.prefs.last_synced_at = Some(pushed_at);
                self.persist_prefs();
            }
            Err(error) => {
                tracing::warn!(%error, "seed push failed, local data stays on this device");
            }
        }
    }

    /// A store mutated. Schedules one debounced flush per region; later
    /// mutations within the window ride along with it.
    fn handle_mutation(&mut self, region: SyncRegion) {
        if self.state() != SyncState::Live || self.partition.is_none() || !self.prefs.sync_enabled
        {
            return;
        }
        if !self.pending.insert(region) {
            return;
        }

        let generation = self.generation;
        let events = self.events_tx.clone();
        let debounce = self.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = events.send(EngineEvent::Flush { generation, region });
        });
    }

    /// A debounce window elapsed: push the region's current state. The
    /// patch is built now, not when the mutation happened, so the write
    /// carries everything the window coalesced.
    async fn handle_flush(&mut self, generation: u64, region: SyncRegion) {
        if generation != self.generation {
            return;
        }
        self.pending.remove(&region);
        if self.state() != SyncState::Live || !self.prefs.sync_enabled {
            return;
        }
        let Some(partition) = self.partition else {
            return;
        };

        let mut patch = self.stores.region_patch(region);
        let pushed_at = now_millis();
        patch.last_synced_at = Some(pushed_at);

        match self.gateway.write(&partition, patch).await {
            Ok(()) => {
                self.prefs.last_synced_at = Some(pushed_at);
                self.persist_prefs();
                tracing::debug!(%region, "pushed region");
            }
            Err(error) => {
                tracing::warn!(%error, %region, "push failed, local change kept");
            }
        }
    }

    /// A live delivery. Only reachable while this session's subscription
    /// is held, so there is no stale snapshot to guard against; echoes
    /// of this device's own pushes land here too and merge idempotently.
    fn handle_delivery(&mut self, snapshot: &Snapshot) {
        if !self.pending.is_empty() {
            // Local state is ahead of this delivery for the regions
            // awaiting a flush; the echo after that flush carries a
            // superset of it.
            tracing::debug!("holding delivery back, pushes pending");
            return;
        }
        merge::apply_snapshot(&self.stores, snapshot);
        self.prefs.last_synced_at = Some(snapshot.last_synced_at);
        self.persist_prefs();
        tracing::debug!(last_synced_at = snapshot.last_synced_at, "merged live delivery");
    }

    async fn handle_set_sync_enabled(&mut self, enabled: bool) {
        if self.prefs.sync_enabled == enabled {
            return;
        }
        self.prefs.sync_enabled = enabled;
        self.persist_prefs();

        if enabled {
            if self.identity.is_some() && self.state() == SyncState::Idle {
                self.start_session().await;
            }
        } else {
            tracing::info!("sync disabled, stopping the session");
            self.stop_session();
            self.set_state(SyncState::Idle);
        }
    }

    async fn handle_refresh(&mut self) {
        if self.identity.is_none() {
            return;
        }
        tracing::info!("refreshing household membership");
        self.stop_session();
        self.start_session().await;
    }

    fn state(&self) -> SyncState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SyncState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(%state, "sync state changed");
        }
    }

    fn persist_prefs(&self) {
        if let Err(error) = save_slot(self.local.as_ref(), PREFS_SLOT, &self.prefs) {
            tracing::warn!(%error, slot = PREFS_SLOT, "failed to persist session prefs");
        }
        self.prefs_tx.send_replace(self.prefs.clone());
    }
}

/// Resolves with the next delivery while a subscription is live, or
/// parks forever so the select loop sleeps on its other inputs.
async fn next_delivery(subscription: &mut Option<Subscription>) -> Option<Snapshot> {
    match subscription {
        Some(live) => live.next().await,
        None => std::future::pending().await,
    }
}
