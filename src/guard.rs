//! Route guards: decide whether a protected view may render.
//!
//! Every guard starts in `Checking` and settles exactly once into `Allowed`
//! or `Denied`. A denial always carries (and issues) a redirect to login
//! that remembers the requested location.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::backend::ApiClient;
use crate::navigation::{Navigator, Notifier, Redirect};
use crate::role::RoleResolver;
use crate::session::SessionSource;

/// Shown when a signed-in account has no doctor profile.
pub const NOT_A_DOCTOR: &str =
    "Access denied: only registered doctors can open this page. You have been signed out.";
/// Shown when the doctor profile lookup itself fails.
pub const PROFILE_CHECK_FAILED: &str =
    "Could not verify your doctor profile. Please sign in again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GuardState {
    Checking,
    Allowed,
    Denied { redirect: Redirect },
}

impl GuardState {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardState::Allowed)
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, GuardState::Checking)
    }
}

#[async_trait]
pub trait Guard: Send + Sync {
    /// Resolve the guard for `location`. Suspends while the session is loading.
    async fn check(&self, location: &str) -> GuardState;
}

/// Run `guard` in the background and expose its state, starting at `Checking`.
pub fn observe(guard: Arc<dyn Guard>, location: impl Into<String>) -> watch::Receiver<GuardState> {
    let location = location.into();
    let (tx, rx) = watch::channel(GuardState::Checking);
    tokio::spawn(async move {
        let state = guard.check(&location).await;
        tx.send_replace(state);
    });
    rx
}

/// Shared denial path.
struct Gate {
    session: Arc<SessionSource>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl Gate {
    async fn deny(&self, location: &str, sign_out: bool) -> GuardState {
        if sign_out {
            if let Err(e) = self.session.sign_out().await {
                tracing::warn!(error = %e, "Forced sign-out on denial failed");
            }
        }
        let redirect = Redirect::new(&self.login_path).returning_to(location);
        tracing::info!(location = %location, signed_out = sign_out, "Guard denied access");
        self.navigator.redirect(redirect.clone());
        GuardState::Denied { redirect }
    }
}

// ═══════════════════════════════════════════════════════════
// AuthGuard
// ═══════════════════════════════════════════════════════════

/// Any signed-in identity.
pub struct AuthGuard {
    gate: Gate,
}

impl AuthGuard {
    pub fn new(session: Arc<SessionSource>, navigator: Arc<dyn Navigator>, login_path: &str) -> Self {
        Self {
            gate: Gate {
                session,
                navigator,
                login_path: login_path.to_string(),
            },
        }
    }
}

#[async_trait]
impl Guard for AuthGuard {
    async fn check(&self, location: &str) -> GuardState {
        self.gate.session.wait_idle().await;
        if self.gate.session.current_identity().is_some() {
            GuardState::Allowed
        } else {
            self.gate.deny(location, false).await
        }
    }
}

// ═══════════════════════════════════════════════════════════
// RoleGuard
// ═══════════════════════════════════════════════════════════

/// Signed in and confirmed as a doctor by the role check.
///
/// A signed-in identity that fails the check is signed out before the
/// redirect.
pub struct RoleGuard {
    gate: Gate,
    roles: Arc<RoleResolver>,
}

impl RoleGuard {
    pub fn new(
        session: Arc<SessionSource>,
        roles: Arc<RoleResolver>,
        navigator: Arc<dyn Navigator>,
        login_path: &str,
    ) -> Self {
        Self {
            gate: Gate {
                session,
                navigator,
                login_path: login_path.to_string(),
            },
            roles,
        }
    }
}

#[async_trait]
impl Guard for RoleGuard {
    async fn check(&self, location: &str) -> GuardState {
        self.gate.session.wait_idle().await;
        if self.gate.session.current_identity().is_none() {
            return self.gate.deny(location, false).await;
        }
        if self.roles.is_elevated().await {
            GuardState::Allowed
        } else {
            self.gate.deny(location, true).await
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ProfessionalGuard
// ═══════════════════════════════════════════════════════════

/// Signed in and owning a registered doctor profile (matched by email).
pub struct ProfessionalGuard {
    gate: Gate,
    client: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
}

impl ProfessionalGuard {
    pub fn new(
        client: Arc<ApiClient>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        login_path: &str,
    ) -> Self {
        Self {
            gate: Gate {
                session: client.session().clone(),
                navigator,
                login_path: login_path.to_string(),
            },
            client,
            notifier,
        }
    }
}

#[async_trait]
impl Guard for ProfessionalGuard {
    async fn check(&self, location: &str) -> GuardState {
        self.gate.session.wait_idle().await;
        let Some(identity) = self.gate.session.current_identity() else {
            return self.gate.deny(location, false).await;
        };

        match self.client.doctors().find_by_email(&identity.email).await {
            Ok(Some(doctor)) => {
                tracing::debug!(doctor_id = %doctor.id, "Doctor profile verified");
                GuardState::Allowed
            }
            Ok(None) => {
                self.notifier.error(NOT_A_DOCTOR);
                self.gate.deny(location, true).await
            }
            Err(e) => {
                tracing::warn!(email = %identity.email, error = %e, "Doctor profile lookup failed");
                self.notifier.error(PROFILE_CHECK_FAILED);
                self.gate.deny(location, true).await
            }
        }
    }
}
