//! The external identity provider seam.
//!
//! The provider owns accounts and credentials; the client sees it through
//! a handful of async calls plus an ordered stream of identity changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::Identity;

/// Errors reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account already exists for {0}")]
    AccountExists(String),
    #[error("Password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("Sign-in was cancelled")]
    Cancelled,
    #[error("No signed-in user")]
    NotSignedIn,
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("Internal lock error")]
    LockPoisoned,
}

/// External identity provider.
///
/// Every successful sign-in, account creation or sign-out must be followed
/// by a notification on the `subscribe()` channel.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError>;

    /// Create an account and sign it in.
    async fn create_account(&self, email: &str, password: &str)
        -> Result<Identity, IdentityError>;

    /// Federated (popup-style) sign-in.
    async fn sign_in_with_federated(&self) -> Result<Identity, IdentityError>;

    /// Set the display name of the signed-in identity.
    async fn update_profile(&self, display_name: &str) -> Result<Identity, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Identity notifications in emission order, `None` meaning signed out.
    ///
    /// The first item is the state at subscription time. Nothing is merged
    /// or dropped: a sign-out followed by a sign-in yields both items.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Option<Identity>>;
}

// ═══════════════════════════════════════════════════════════
// FakeIdentityProvider
// ═══════════════════════════════════════════════════════════

/// Minimum password length the fake provider accepts.
const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct Notifications {
    current: Option<Identity>,
    subscribers: Vec<mpsc::UnboundedSender<Option<Identity>>>,
}

/// In-process identity provider for tests and offline demos.
pub struct FakeIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    federated: Mutex<Option<Identity>>,
    offline: AtomicBool,
    notifications: Mutex<Notifications>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            federated: Mutex::new(None),
            offline: AtomicBool::new(false),
            notifications: Mutex::new(Notifications::default()),
        }
    }

    /// Register an account without signing it in.
    pub fn with_account(self, email: &str, password: &str, display_name: Option<&str>) -> Self {
        let mut identity = Identity::new(uuid::Uuid::new_v4().to_string(), email);
        identity.display_name = display_name.map(str::to_string);
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity,
                },
            );
        }
        self
    }

    /// Identity returned by federated sign-in. Without one the popup is
    /// treated as dismissed.
    pub fn with_federated(self, identity: Identity) -> Self {
        if let Ok(mut federated) = self.federated.lock() {
            *federated = Some(identity);
        }
        self
    }

    /// Start with an identity already signed in (restored session).
    pub fn signed_in_as(self, identity: Identity) -> Self {
        self.publish(Some(identity));
        self
    }

    /// Identity as of the last notification.
    pub fn current(&self) -> Option<Identity> {
        self.notifications
            .lock()
            .ok()
            .and_then(|n| n.current.clone())
    }

    /// Simulate the provider being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Push a notification as if the provider changed state on its own
    /// (e.g. session revoked elsewhere).
    pub fn emit(&self, identity: Option<Identity>) {
        self.publish(identity);
    }

    /// Record the new state and deliver it to every live subscriber.
    /// Sending under the lock keeps delivery order equal to emission order.
    fn publish(&self, identity: Option<Identity>) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.current = identity.clone();
            notifications
                .subscribers
                .retain(|tx| tx.send(identity.clone()).is_ok());
        }
    }

    fn ensure_online(&self) -> Result<(), IdentityError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable("network error".into()));
        }
        Ok(())
    }
}

impl Default for FakeIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        self.ensure_online()?;
        let identity = {
            let accounts = self.accounts.lock().map_err(|_| IdentityError::LockPoisoned)?;
            match accounts.get(email) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        self.ensure_online()?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::WeakPassword(MIN_PASSWORD_LEN));
        }
        let identity = {
            let mut accounts = self.accounts.lock().map_err(|_| IdentityError::LockPoisoned)?;
            if accounts.contains_key(email) {
                return Err(IdentityError::AccountExists(email.to_string()));
            }
            let identity = Identity::new(uuid::Uuid::new_v4().to_string(), email);
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_federated(&self) -> Result<Identity, IdentityError> {
        self.ensure_online()?;
        let identity = self
            .federated
            .lock()
            .map_err(|_| IdentityError::LockPoisoned)?
            .clone()
            .ok_or(IdentityError::Cancelled)?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_profile(&self, display_name: &str) -> Result<Identity, IdentityError> {
        self.ensure_online()?;
        let mut identity = self.current().ok_or(IdentityError::NotSignedIn)?;
        identity.display_name = Some(display_name.to_string());
        if let Ok(mut accounts) = self.accounts.lock() {
            if let Some(account) = accounts.get_mut(&identity.email) {
                account.identity = identity.clone();
            }
        }
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.publish(None);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Option<Identity>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut notifications) = self.notifications.lock() {
            let _ = tx.send(notifications.current.clone());
            notifications.subscribers.push(tx);
        }
        rx
    }
}
