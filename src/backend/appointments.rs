use serde::Serialize;

use super::client::ApiClient;
use super::error::ApiError;
use crate::models::{Appointment, NewAppointment};

#[derive(Serialize)]
struct Approval {
    booking: bool,
}

/// `/appointments` endpoints.
pub struct AppointmentsApi<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn appointments(&self) -> AppointmentsApi<'_> {
        AppointmentsApi { client: self }
    }
}

impl AppointmentsApi<'_> {
    /// All appointments, or only those of one patient.
    pub async fn list(&self, patient_email: Option<&str>) -> Result<Vec<Appointment>, ApiError> {
        match patient_email {
            Some(email) => {
                self.client
                    .get_data(&["appointments"], &[("email", email)])
                    .await
            }
            None => self.client.get_data(&["appointments"], &[]).await,
        }
    }

    /// Appointments booked with one doctor.
    ///
    /// The backend has no doctor filter, so the full list is narrowed here.
    pub async fn for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, ApiError> {
        let all = self.list(None).await?;
        Ok(all.into_iter().filter(|a| a.doctor_id == doctor_id).collect())
    }

    pub async fn book(&self, request: &NewAppointment) -> Result<Appointment, ApiError> {
        tracing::info!(
            doctor_id = %request.doctor_id,
            date = %request.date,
            time = %request.time,
            "Booking appointment"
        );
        self.client.post_data(&["appointments"], request).await
    }

    /// Doctor approval: sets `booking` to true.
    pub async fn approve(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .put_ack(&["appointments", id], &Approval { booking: true })
            .await
    }

    pub async fn cancel(&self, id: &str) -> Result<(), ApiError> {
        tracing::info!(appointment_id = %id, "Cancelling appointment");
        self.client.delete_ack(&["appointments", id]).await
    }
}
