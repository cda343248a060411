//! Application state: the session handshake, API client, role resolver and
//! flows wired together once, then shared by every view.
//!
//! Nothing here is global. The host constructs one `CoreState` with its own
//! identity provider, navigator and notifier; tests substitute fakes.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::backend::{ApiClient, ApiError, HttpTokenIssuer};
use crate::booking::BookingFlow;
use crate::config::ClientConfig;
use crate::dashboard::{DoctorDashboard, PatientDashboard};
use crate::export::{self, ExportError};
use crate::guard::{AuthGuard, Guard, ProfessionalGuard, RoleGuard};
use crate::models::Identity;
use crate::navigation::{Navigator, Notifier};
use crate::role::RoleResolver;
use crate::session::{IdentityProvider, SessionSource, TokenBridge};
use crate::storage::{FileTokenStore, TokenStore};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No signed-in identity")]
    NotSignedIn,
    #[error("No doctor profile for {0}")]
    NoDoctorProfile(String),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: ClientConfig,
    session: Arc<SessionSource>,
    client: Arc<ApiClient>,
    roles: Arc<RoleResolver>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl CoreState {
    /// Wire everything with the token persisted under `config.storage_dir`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let store = Arc::new(FileTokenStore::new(&config.storage_dir, &config.token_key));
        Self::with_store(config, provider, store, navigator, notifier)
    }

    pub fn with_store(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let issuer = Arc::new(HttpTokenIssuer::new(&config)?);
        let bridge = Arc::new(TokenBridge::new(issuer, store.clone(), config.settle_delay()));
        let session = SessionSource::start(provider, bridge);
        let client = Arc::new(ApiClient::new(&config, session.clone(), store, navigator.clone())?);
        let roles = Arc::new(RoleResolver::new(client.clone()));

        tracing::info!(
            api = %config.api_base_url,
            storage = %config.storage_dir.display(),
            "Client core initialized"
        );

        Ok(Self {
            config,
            session,
            client,
            roles,
            navigator,
            notifier,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionSource> {
        &self.session
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn roles(&self) -> &Arc<RoleResolver> {
        &self.roles
    }

    fn identity(&self) -> Result<Identity, CoreError> {
        self.session.current_identity().ok_or(CoreError::NotSignedIn)
    }

    // ── Guards ──────────────────────────────────────────────

    pub fn auth_guard(&self) -> Arc<dyn Guard> {
        Arc::new(AuthGuard::new(
            self.session.clone(),
            self.navigator.clone(),
            &self.config.login_path,
        ))
    }

    pub fn role_guard(&self) -> Arc<dyn Guard> {
        Arc::new(RoleGuard::new(
            self.session.clone(),
            self.roles.clone(),
            self.navigator.clone(),
            &self.config.login_path,
        ))
    }

    pub fn professional_guard(&self) -> Arc<dyn Guard> {
        Arc::new(ProfessionalGuard::new(
            self.client.clone(),
            self.navigator.clone(),
            self.notifier.clone(),
            &self.config.login_path,
        ))
    }

    // ── Flows and views ─────────────────────────────────────

    pub fn booking(&self) -> BookingFlow {
        BookingFlow::new(self.client.clone(), self.notifier.clone())
    }

    /// The signed-in patient's appointments, bucketed against `today`.
    pub async fn patient_dashboard(&self, today: NaiveDate) -> Result<PatientDashboard, CoreError> {
        let identity = self.identity()?;
        Ok(PatientDashboard::fetch(&self.client, &identity.email, today).await?)
    }

    /// The signed-in doctor's requests and visits.
    pub async fn doctor_dashboard(&self) -> Result<DoctorDashboard, CoreError> {
        let identity = self.identity()?;
        let doctor = self
            .client
            .doctors()
            .find_by_email(&identity.email)
            .await?
            .ok_or_else(|| CoreError::NoDoctorProfile(identity.email.clone()))?;
        Ok(DoctorDashboard::fetch(&self.client, &doctor.id).await?)
    }

    /// Render a prescription to PDF under the data directory's `exports/`.
    pub async fn export_prescription(&self, id: &str) -> Result<PathBuf, CoreError> {
        let prescription = self.client.prescriptions().get(id).await?;
        let bytes = export::prescription_pdf(&prescription)?;
        let path = export::save_pdf(
            &bytes,
            &export::default_filename(&prescription),
            &self.config.storage_dir,
        )?;
        self.notifier.success("Prescription downloaded");
        Ok(path)
    }
}
