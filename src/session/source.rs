//! Identity session source: the single subscriber to the identity provider.
//!
//! Publishes the current identity and a shared `loading` flag, and drives
//! the token bridge on every identity transition. It is the only component
//! that calls the provider's mutating operations.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::bridge::{Readiness, TokenBridge};
use super::provider::{IdentityError, IdentityProvider};
use crate::models::Identity;

/// Upper bound for an operation waiting on its identity notification.
const SETTLE_BOUND: Duration = Duration::from_secs(15);

/// Identity session state shared by guards, the API client and views.
pub struct SessionSource {
    provider: Arc<dyn IdentityProvider>,
    bridge: Arc<TokenBridge>,
    identity: watch::Sender<Option<Identity>>,
    loading: watch::Sender<bool>,
}

impl SessionSource {
    /// Create the source and start consuming provider notifications.
    ///
    /// `loading` stays true until the provider's initial state (including a
    /// restored identity's token exchange) has been processed.
    /// Must be called inside a tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>, bridge: Arc<TokenBridge>) -> Arc<Self> {
        let notifications = provider.subscribe();
        let source = Arc::new(Self {
            provider,
            bridge,
            identity: watch::channel(None).0,
            loading: watch::channel(true).0,
        });
        tokio::spawn(Self::listen(Arc::downgrade(&source), notifications));
        source
    }

    async fn listen(
        source: Weak<Self>,
        mut notifications: mpsc::UnboundedReceiver<Option<Identity>>,
    ) {
        let mut first = true;
        while let Some(next) = notifications.recv().await {
            let Some(this) = source.upgrade() else {
                return;
            };
            let exchange = this.apply(next);
            if first {
                if let Some(handle) = exchange {
                    let _ = handle.await;
                }
                this.loading.send_replace(false);
                first = false;
            }
        }
        tracing::debug!("Identity provider closed its subscription");
    }

    /// Process one notification. Returns the spawned exchange, if any.
    fn apply(&self, next: Option<Identity>) -> Option<JoinHandle<()>> {
        let previous = self.identity.borrow().clone();
        match next {
            Some(identity) => {
                if previous
                    .as_ref()
                    .is_some_and(|p| p.same_principal(&identity))
                {
                    // Profile refresh of the same principal; token stays valid.
                    self.identity.send_replace(Some(identity));
                    return None;
                }
                // Readiness goes Pending before anyone can observe the identity.
                let epoch = self.bridge.begin();
                let email = identity.email.clone();
                tracing::info!(email = %email, epoch, "Identity established");
                self.identity.send_replace(Some(identity));

                let bridge = Arc::clone(&self.bridge);
                Some(tokio::spawn(async move {
                    bridge.exchange(epoch, &email).await;
                }))
            }
            None => {
                if previous.is_some() {
                    tracing::info!("Identity cleared");
                }
                self.bridge.clear();
                self.identity.send_replace(None);
                None
            }
        }
    }

    // ── Read side ───────────────────────────────────────────

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    pub fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Resolve once `loading` is false.
    pub async fn wait_idle(&self) {
        let mut rx = self.loading.subscribe();
        let _ = rx.wait_for(|loading| !loading).await;
    }

    pub fn readiness(&self) -> Readiness {
        self.bridge.readiness()
    }

    pub fn bridge(&self) -> &Arc<TokenBridge> {
        &self.bridge
    }

    /// Identity epoch; changes on every sign-in and sign-out.
    pub fn epoch(&self) -> u64 {
        self.bridge.current_epoch()
    }

    // ── Operations ──────────────────────────────────────────

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        self.loading.send_replace(true);
        let result = self.provider.sign_in_with_password(email, password).await;
        self.complete_sign_in("password", result).await
    }

    /// Create an account, optionally set its display name, and sign it in.
    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, IdentityError> {
        self.loading.send_replace(true);
        let mut result = self.provider.create_account(email, password).await;
        if let (Ok(identity), Some(name)) = (&result, display_name) {
            match self.provider.update_profile(name).await {
                Ok(updated) => result = Ok(updated),
                Err(e) => {
                    tracing::warn!(email = %identity.email, error = %e, "Account created but display name not set");
                }
            }
        }
        self.complete_sign_in("sign_up", result).await
    }

    pub async fn sign_in_with_federated(&self) -> Result<Identity, IdentityError> {
        self.loading.send_replace(true);
        let result = self.provider.sign_in_with_federated().await;
        self.complete_sign_in("federated", result).await
    }

    /// Sign out. Safe to call when already signed out.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.loading.send_replace(true);
        let result = self.provider.sign_out().await;
        match &result {
            Ok(()) => self.settle(|current| current.is_none()).await,
            Err(e) => tracing::warn!(error = %e, "Sign-out failed"),
        }
        self.loading.send_replace(false);
        result
    }

    async fn complete_sign_in(
        &self,
        method: &'static str,
        result: Result<Identity, IdentityError>,
    ) -> Result<Identity, IdentityError> {
        match result {
            Ok(identity) => {
                self.settle(|current| {
                    current
                        .as_ref()
                        .is_some_and(|c| c.same_principal(&identity))
                })
                .await;
                self.loading.send_replace(false);
                tracing::info!(method, email = %identity.email, "Signed in");
                Ok(identity)
            }
            Err(e) => {
                tracing::warn!(method, error = %e, "Sign-in failed");
                self.loading.send_replace(false);
                Err(e)
            }
        }
    }

    /// Wait until the published identity satisfies `expected` and no token
    /// exchange is in flight.
    async fn settle(&self, expected: impl Fn(&Option<Identity>) -> bool) {
        let mut identity = self.identity.subscribe();
        let mut readiness = self.bridge.subscribe();
        let wait = async {
            loop {
                let matched = expected(&identity.borrow_and_update());
                if matched && readiness.borrow_and_update().is_settled() {
                    break;
                }
                tokio::select! {
                    changed = identity.changed() => if changed.is_err() { break },
                    changed = readiness.changed() => if changed.is_err() { break },
                }
            }
        };
        if tokio::time::timeout(SETTLE_BOUND, wait).await.is_err() {
            tracing::warn!("Identity notification did not settle in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::provider::FakeIdentityProvider;
    use crate::storage::{MemoryTokenStore, TokenStore};
    use crate::testing::{GatedIssuer, StaticIssuer};
    use crate::backend::ApiError;
    use crate::session::bridge::TokenIssuer;

    fn start(
        provider: FakeIdentityProvider,
        issuer: Arc<dyn TokenIssuer>,
    ) -> (Arc<SessionSource>, Arc<FakeIdentityProvider>, Arc<MemoryTokenStore>) {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryTokenStore::new());
        let bridge = Arc::new(TokenBridge::new(issuer, store.clone(), Duration::ZERO));
        let source = SessionSource::start(provider.clone(), bridge);
        (source, provider, store)
    }

    fn nadia() -> FakeIdentityProvider {
        FakeIdentityProvider::new().with_account("nadia@uni.edu", "secret1", Some("Nadia"))
    }

    #[tokio::test]
    async fn initial_load_clears_loading() {
        let (source, _, _) = start(nadia(), Arc::new(StaticIssuer::token("jwt")));
        source.wait_idle().await;
        assert!(source.current_identity().is_none());
        assert_eq!(source.readiness(), Readiness::SignedOut);
    }

    #[tokio::test]
    async fn restored_identity_exchanges_before_idle() {
        let provider = nadia().signed_in_as(Identity::new("u1", "kept@uni.edu"));
        let (source, _, store) = start(provider, Arc::new(StaticIssuer::token("jwt-restored")));
        source.wait_idle().await;
        assert_eq!(source.current_identity().unwrap().email, "kept@uni.edu");
        assert!(source.readiness().is_ready());
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-restored"));
    }

    #[tokio::test]
    async fn sign_in_persists_token_and_clears_loading() {
        let (source, _, store) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;

        let identity = source
            .sign_in_with_password("nadia@uni.edu", "secret1")
            .await
            .unwrap();
        assert_eq!(identity.email, "nadia@uni.edu");
        assert!(!source.is_loading());
        assert!(matches!(source.readiness(), Readiness::Ready { .. }));
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn failed_sign_in_clears_loading() {
        let (source, _, store) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;

        let err = source
            .sign_in_with_password("nadia@uni.edu", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
        assert!(!source.is_loading());
        assert!(source.current_identity().is_none());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn provider_outage_clears_loading() {
        let (source, provider, _) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;
        provider.set_offline(true);

        let err = source.sign_in_with_federated().await.unwrap_err();
        assert!(matches!(err, IdentityError::Unavailable(_)));
        assert!(!source.is_loading());
    }

    #[tokio::test]
    async fn readiness_is_pending_when_identity_appears() {
        let issuer = Arc::new(GatedIssuer::new());
        let (source, _, store) = start(nadia(), issuer.clone());
        source.wait_idle().await;

        let mut identities = source.subscribe_identity();
        let sign_in = {
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                source.sign_in_with_password("nadia@uni.edu", "secret1").await
            })
        };

        identities.wait_for(|i| i.is_some()).await.unwrap();
        assert!(matches!(source.readiness(), Readiness::Pending { .. }));
        assert!(source.is_loading());

        issuer.wait_for_requests(1).await;
        assert!(!source.readiness().is_ready());
        issuer.release("nadia@uni.edu", Ok(Some("jwt-late".into())));

        sign_in.await.unwrap().unwrap();
        assert!(source.readiness().is_ready());
        assert!(!source.is_loading());
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-late"));
    }

    #[tokio::test]
    async fn sign_out_clears_token_and_readiness() {
        let (source, _, store) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;
        source
            .sign_in_with_password("nadia@uni.edu", "secret1")
            .await
            .unwrap();

        source.sign_out().await.unwrap();
        assert!(source.current_identity().is_none());
        assert_eq!(source.readiness(), Readiness::SignedOut);
        assert_eq!(store.load().unwrap(), None);
        assert!(!source.is_loading());
    }

    #[tokio::test]
    async fn repeated_sign_out_is_idempotent() {
        let (source, _, store) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;

        source.sign_out().await.unwrap();
        source.sign_out().await.unwrap();
        assert_eq!(source.readiness(), Readiness::SignedOut);
        assert!(!source.readiness().is_ready());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn sign_up_sets_display_name() {
        let (source, _, _) = start(FakeIdentityProvider::new(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;

        let identity = source
            .sign_up_with_password("karim@uni.edu", "secret1", Some("Karim"))
            .await
            .unwrap();
        assert_eq!(identity.display_name.as_deref(), Some("Karim"));
        assert_eq!(source.current_identity().unwrap().label(), "Karim");
        assert!(source.readiness().is_ready());
    }

    #[tokio::test]
    async fn profile_refresh_does_not_exchange_again() {
        let issuer = Arc::new(StaticIssuer::token("jwt-1"));
        let (source, provider, _) = start(nadia(), issuer.clone());
        source.wait_idle().await;
        source
            .sign_in_with_password("nadia@uni.edu", "secret1")
            .await
            .unwrap();
        let epoch = source.epoch();

        provider.update_profile("Nadia R.").await.unwrap();
        let mut identities = source.subscribe_identity();
        identities
            .wait_for(|i| i.as_ref().and_then(|i| i.display_name.as_deref()) == Some("Nadia R."))
            .await
            .unwrap();
        assert_eq!(source.epoch(), epoch);
        assert_eq!(issuer.calls(), 1);
    }

    #[tokio::test]
    async fn quick_account_switch_never_reuses_previous_token() {
        let issuer = Arc::new(GatedIssuer::new());
        let (source, provider, store) = start(nadia(), issuer.clone());
        source.wait_idle().await;

        let sign_in = {
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                source.sign_in_with_password("nadia@uni.edu", "secret1").await
            })
        };
        issuer.wait_for_requests(1).await;
        issuer.release("nadia@uni.edu", Ok(Some("jwt-nadia".into())));
        sign_in.await.unwrap().unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("jwt-nadia"));
        let epoch = source.epoch();

        // Sign-out and the next sign-in arrive back to back
        provider.emit(None);
        provider.emit(Some(Identity::new("u-2", "karim@uni.edu")));
        issuer.wait_for_requests(2).await;
        issuer.release("karim@uni.edu", Err(ApiError::Timeout));

        let mut readiness = source.bridge().subscribe();
        let settled = *readiness
            .wait_for(|r| matches!(r, Readiness::Degraded { .. }))
            .await
            .unwrap();
        // One epoch for the sign-out, one for the new identity
        assert_eq!(settled, Readiness::Degraded { epoch: epoch + 2 });
        assert_eq!(source.current_identity().unwrap().email, "karim@uni.edu");
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_and_back_in_exchanges_again() {
        let issuer = Arc::new(StaticIssuer::token("jwt-1"));
        let (source, provider, _) = start(nadia(), issuer.clone());
        source.wait_idle().await;
        let identity = source
            .sign_in_with_password("nadia@uni.edu", "secret1")
            .await
            .unwrap();
        let epoch = source.epoch();

        provider.emit(None);
        provider.emit(Some(identity));
        let mut readiness = source.bridge().subscribe();
        readiness
            .wait_for(|r| *r == Readiness::Ready { epoch: epoch + 2 })
            .await
            .unwrap();
        assert_eq!(issuer.calls(), 2);
    }

    #[tokio::test]
    async fn external_revocation_clears_session() {
        let (source, provider, store) = start(nadia(), Arc::new(StaticIssuer::token("jwt-1")));
        source.wait_idle().await;
        source
            .sign_in_with_password("nadia@uni.edu", "secret1")
            .await
            .unwrap();

        provider.emit(None);
        let mut identities = source.subscribe_identity();
        identities.wait_for(|i| i.is_none()).await.unwrap();
        assert_eq!(source.readiness(), Readiness::SignedOut);
        assert_eq!(store.load().unwrap(), None);
    }
}
