use super::client::ApiClient;
use super::error::ApiError;
use crate::models::{NewPrescription, Prescription};

/// `/prescriptions` endpoints.
pub struct PrescriptionsApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn prescriptions(&self) -> PrescriptionsApi<'_> {
        PrescriptionsApi { client: self }
    }
}

impl PrescriptionsApi<'_> {
    pub async fn create(&self, prescription: &NewPrescription) -> Result<Prescription, ApiError> {
        tracing::info!(
            appointment_id = %prescription.appointment_id,
            medications = prescription.medications.len(),
            "Writing prescription"
        );
        self.client.post_data(&["prescriptions"], prescription).await
    }

    pub async fn for_patient(&self, email: &str) -> Result<Vec<Prescription>, ApiError> {
        self.client
            .get_data(&["prescriptions", "patient", email], &[])
            .await
    }

    pub async fn for_doctor(&self, doctor_id: &str) -> Result<Vec<Prescription>, ApiError> {
        self.client
            .get_data(&["prescriptions", "doctor", doctor_id], &[])
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Prescription, ApiError> {
        self.client.get_data(&["prescriptions", id], &[]).await
    }
}
