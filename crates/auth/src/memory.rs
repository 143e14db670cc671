use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};

use crate::identity::{AuthError, FederatedProvider, Identity};
use crate::provider::IdentityProvider;

/// In-memory identity provider used by tests and the device simulator.
///
/// Accounts live in a process-local table, passwords are stored as salted
/// digests, and the phone flow hands out a fixed verification code. User
/// ids derive from the account subject, so two instances modelling the
/// same backend agree on who a user is without sharing state.
pub struct MemoryIdentityProvider {
    state: Mutex<ProviderState>,
    identity_tx: watch::Sender<Option<Identity>>,
    phone_code: String,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<String, Account>,
    challenges: HashMap<String, String>,
    offline: bool,
}

struct Account {
    user_id: String,
    email: String,
    display_name: String,
    password_digest: String,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone())
            .with_display_name(self.display_name.clone())
            .with_email(self.email.clone())
    }
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        let (identity_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(ProviderState::default()),
            identity_tx,
            phone_code: "123456".to_owned(),
        }
    }

    /// Simulates losing or regaining connectivity to the provider backend.
    /// While offline, every operation that would hit the backend fails with
    /// [`AuthError::Network`]; sign-out still succeeds locally.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Begins a phone sign-in. Always fails with
    /// [`AuthError::ChallengeRequired`] after recording the pending
    /// challenge; the caller completes it via [`Self::verify_phone_code`].
    pub async fn sign_in_with_phone(&self, phone: &str) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(AuthError::Network("identity provider unreachable".to_owned()));
        }
        state
            .challenges
            .insert(phone.trim().to_owned(), self.phone_code.clone());
        Err(AuthError::ChallengeRequired)
    }

    /// Completes a phone sign-in started by [`Self::sign_in_with_phone`].
    pub async fn verify_phone_code(&self, phone: &str, code: &str) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(AuthError::Network("identity provider unreachable".to_owned()));
        }
        let phone = phone.trim().to_owned();
        match state.challenges.get(&phone) {
            Some(expected) if expected == code => {}
            Some(_) => return Err(AuthError::InvalidCredentials),
            None => return Err(AuthError::InvalidCredentials),
        }
        state.challenges.remove(&phone);

        let identity = Identity::new(stable_user_id(&phone)).with_phone(phone);
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let state = self.state.lock().await;
        if state.offline {
            return Err(AuthError::Network("identity provider unreachable".to_owned()));
        }
        let email = normalize_email(email);
        let account = state
            .accounts
            .get(&email)
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password_digest != password_digest(&email, password) {
            return Err(AuthError::InvalidCredentials);
        }

        let identity = account.identity();
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let mut state = self.state.lock().await;
        if state.offline {
            return Err(AuthError::Network("identity provider unreachable".to_owned()));
        }
        let email = normalize_email(email);
        if state.accounts.contains_key(&email) {
            return Err(AuthError::AccountExists);
        }

        let account = Account {
            user_id: stable_user_id(&email),
            email: email.clone(),
            display_name: display_name.to_owned(),
            password_digest: password_digest(&email, password),
        };
        let identity = account.identity();
        state.accounts.insert(email, account);

        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_federated(
        &self,
        provider: FederatedProvider,
        subject: &str,
    ) -> Result<Identity, AuthError> {
        if self.state.lock().await.offline {
            return Err(AuthError::Network("identity provider unreachable".to_owned()));
        }

        // Null separator keeps (provider, subject) pairs from colliding.
        let identity = Identity::new(stable_user_id(&format!("{provider}\0{subject}")));
        self.identity_tx.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.identity_tx.send_replace(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity_tx.borrow().clone()
    }

    fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity_tx.subscribe()
    }
}

/// User id derived from the account subject. Deterministic so separate
/// provider instances hand out the same id for the same account.
fn stable_user_id(subject: &str) -> String {
    let digest = Sha256::digest(subject.as_bytes());
    let mut id = String::with_capacity(17);
    id.push_str("user-");
    for byte in &digest[..6] {
        use std::fmt::Write as _;
        let _ = write!(&mut id, "{byte:02x}");
    }
    id
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// SHA-256 over `email \0 password`, hex-encoded. The null separator
/// protects the email/password boundary.
fn password_digest(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update([0x00]);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut encoded, "{byte:02x}");
    }
    encoded
}
