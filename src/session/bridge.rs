//! Session token bridge: exchanges an established identity for a
//! backend-issued session token and tracks readiness.
//!
//! Each exchange is tagged with an epoch. Sign-in and sign-out both bump
//! the epoch, so an exchange that resolves after the identity it was started
//! for has gone away cannot write its token or flip readiness.
//!
//! Readiness is broadcast on a `watch` channel; requests await it instead
//! of polling storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::backend::ApiError;
use crate::storage::TokenStore;

/// Issues backend session tokens (`POST /jwt`).
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// `Ok(None)` when the backend answered without a token.
    async fn issue(&self, email: &str) -> Result<Option<String>, ApiError>;
}

/// Token readiness for the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    /// No identity; no token.
    SignedOut,
    /// Identity present, exchange in flight. Indeterminate, not unauthenticated.
    Pending { epoch: u64 },
    /// Token persisted.
    Ready { epoch: u64 },
    /// Exchange failed or returned no token. Ready for gating purposes,
    /// but backend-authenticated calls will fail individually.
    Degraded { epoch: u64 },
}

impl Readiness {
    /// Whether requests may stop waiting and carry whatever token is stored.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Degraded { .. })
    }

    /// Anything but an exchange in flight.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    pub fn epoch(&self) -> Option<u64> {
        match self {
            Self::SignedOut => None,
            Self::Pending { epoch } | Self::Ready { epoch } | Self::Degraded { epoch } => {
                Some(*epoch)
            }
        }
    }
}

/// Bridge between the identity provider and the backend session token.
pub struct TokenBridge {
    issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn TokenStore>,
    epoch: AtomicU64,
    /// Held while comparing the epoch and committing a result, so a
    /// sign-out cannot interleave between the check and the write.
    commit: Mutex<()>,
    readiness: watch::Sender<Readiness>,
    settle_delay: Duration,
}

impl TokenBridge {
    pub fn new(
        issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn TokenStore>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            issuer,
            store,
            epoch: AtomicU64::new(0),
            commit: Mutex::new(()),
            readiness: watch::channel(Readiness::SignedOut).0,
            settle_delay,
        }
    }

    pub fn readiness(&self) -> Readiness {
        *self.readiness.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Start a new identity epoch: readiness drops to `Pending` and any
    /// stored token, which belongs to the previous identity, is dropped.
    pub fn begin(&self) -> u64 {
        let _commit = self.commit.lock().unwrap_or_else(|p| p.into_inner());
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(e) = self.store.clear() {
            tracing::warn!(epoch, error = %e, "Failed to clear previous session token");
        }
        self.readiness.send_replace(Readiness::Pending { epoch });
        epoch
    }

    /// Exchange `email` for a session token on behalf of `epoch`.
    ///
    /// Never fails: a missing token or a failed request ends in `Degraded`.
    /// A stale epoch leaves storage and readiness untouched and returns the
    /// readiness current at that point.
    pub async fn exchange(&self, epoch: u64, email: &str) -> Readiness {
        let issued = self.issuer.issue(email).await;

        let outcome = {
            let _commit = self.commit.lock().unwrap_or_else(|p| p.into_inner());
            if self.epoch.load(Ordering::SeqCst) != epoch {
                tracing::debug!(epoch, "Discarding stale token exchange");
                return self.readiness();
            }

            let outcome = match issued {
                Ok(Some(token)) => match self.store.save(&token) {
                    Ok(()) => Readiness::Ready { epoch },
                    Err(e) => {
                        tracing::warn!(epoch, error = %e, "Failed to persist session token");
                        Readiness::Degraded { epoch }
                    }
                },
                Ok(None) => {
                    tracing::warn!(epoch, "Token endpoint answered without a token");
                    Readiness::Degraded { epoch }
                }
                Err(e) => {
                    tracing::warn!(epoch, error = %e, "Token exchange failed, continuing degraded");
                    Readiness::Degraded { epoch }
                }
            };
            self.readiness.send_replace(outcome);
            outcome
        };

        if matches!(outcome, Readiness::Ready { .. }) {
            tracing::info!(epoch, "Session token ready");
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }
        }
        outcome
    }

    /// Identity went away: drop the token and readiness. No network call.
    pub fn clear(&self) {
        let _commit = self.commit.lock().unwrap_or_else(|p| p.into_inner());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear session token");
        }
        self.readiness.send_replace(Readiness::SignedOut);
    }

    /// Drop a token the backend rejected, keeping readiness as is.
    pub fn invalidate_token(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear rejected session token");
        }
    }

    /// Wait until no exchange is in flight, at most `bound`.
    ///
    /// Returns the readiness observed when the wait ended.
    pub async fn wait_settled(&self, bound: Duration) -> Readiness {
        let mut rx = self.subscribe();
        let observed = match tokio::time::timeout(bound, rx.wait_for(Readiness::is_settled)).await {
            Ok(Ok(state)) => *state,
            Ok(Err(_)) => self.readiness(),
            Err(_) => {
                tracing::warn!(?bound, "Gave up waiting for session token readiness");
                self.readiness()
            }
        };
        observed
    }
}
