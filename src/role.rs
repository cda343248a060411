//! Role resolver: does the current identity hold the doctor role?
//!
//! Answers are cached per identity (email plus session epoch), so a new
//! sign-in always asks the backend again. Failures resolve to `false` and
//! are not cached.

use std::sync::{Arc, Mutex};

use crate::backend::ApiClient;

#[derive(Debug, Clone, PartialEq)]
struct CachedRole {
    email: String,
    epoch: u64,
    elevated: bool,
}

pub struct RoleResolver {
    client: Arc<ApiClient>,
    cache: Mutex<Option<CachedRole>>,
}

impl RoleResolver {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    /// Whether the signed-in identity is a doctor. `false` when signed out.
    pub async fn is_elevated(&self) -> bool {
        let session = self.client.session();
        let Some(identity) = session.current_identity() else {
            return false;
        };
        let epoch = session.epoch();

        if let Some(hit) = self.cached(&identity.email, epoch) {
            return hit;
        }

        match self.client.doctors().is_admin(&identity.email).await {
            Ok(elevated) => {
                // The identity may have changed while the check was in flight.
                if session.epoch() == epoch {
                    self.store(CachedRole {
                        email: identity.email.clone(),
                        epoch,
                        elevated,
                    });
                }
                tracing::debug!(email = %identity.email, elevated, "Role resolved");
                elevated
            }
            Err(e) => {
                tracing::warn!(email = %identity.email, error = %e, "Role check failed, treating as not elevated");
                false
            }
        }
    }

    fn cached(&self, email: &str, epoch: u64) -> Option<bool> {
        let cache = self.cache.lock().ok()?;
        cache
            .as_ref()
            .filter(|c| c.epoch == epoch && c.email == email)
            .map(|c| c.elevated)
    }

    fn store(&self, entry: CachedRole) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(entry);
        }
    }
}
