use serde::Deserialize;

use super::client::ApiClient;
use super::error::ApiError;
use crate::models::{Doctor, DoctorUpdate, NewDoctor};

#[derive(Deserialize)]
struct AdminFlag {
    #[serde(rename = "isAdmin", alias = "admin")]
    is_admin: bool,
}

/// Role check answer, bare or enveloped.
#[derive(Deserialize)]
#[serde(untagged)]
enum RoleCheck {
    Flat(AdminFlag),
    Wrapped { data: AdminFlag },
}

/// `/doctors` endpoints.
pub struct DoctorsApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn doctors(&self) -> DoctorsApi<'_> {
        DoctorsApi { client: self }
    }
}

impl DoctorsApi<'_> {
    pub async fn list(&self) -> Result<Vec<Doctor>, ApiError> {
        self.client.get_data(&["doctors"], &[]).await
    }

    pub async fn get(&self, id: &str) -> Result<Doctor, ApiError> {
        self.client.get_data(&["doctors", id], &[]).await
    }

    /// Doctor self-registration.
    pub async fn register(&self, doctor: &NewDoctor) -> Result<Doctor, ApiError> {
        tracing::info!(email = %doctor.email, "Registering doctor profile");
        self.client.post_data(&["doctors"], doctor).await
    }

    pub async fn update(&self, id: &str, update: &DoctorUpdate) -> Result<(), ApiError> {
        self.client.put_ack(&["doctors", id], update).await
    }

    /// Raw role check (`GET /doctors/admin/:email`). Errors propagate;
    /// callers wanting fail-closed semantics go through `RoleResolver`.
    pub async fn is_admin(&self, email: &str) -> Result<bool, ApiError> {
        let answer: RoleCheck = self
            .client
            .get_json(&["doctors", "admin", email], &[])
            .await?;
        Ok(match answer {
            RoleCheck::Flat(flag) | RoleCheck::Wrapped { data: flag } => flag.is_admin,
        })
    }

    /// The registered doctor profile for `email`, if any.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Doctor>, ApiError> {
        let doctors = self.list().await?;
        Ok(doctors
            .into_iter()
            .find(|d| d.email.eq_ignore_ascii_case(email)))
    }
}
