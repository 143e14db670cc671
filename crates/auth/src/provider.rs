use async_trait::async_trait;
use tokio::sync::watch;

use crate::identity::{AuthError, FederatedProvider, Identity};

/// Boundary to the external identity provider.
///
/// Implementations own the account/session machinery; the sync engine only
/// calls these operations and watches the identity stream. The stream is a
/// watch channel, so an observer that falls behind sees the latest identity
/// state rather than a backlog of intermediate transitions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_in_federated(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_identity(&self) -> Option<Identity>;

    /// Identity transitions, `None` while signed out. The receiver holds
    /// the current value immediately on subscribe.
    fn identity_changes(&self) -> watch::Receiver<Option<Identity>>;
}
