//! User-facing appointment actions: book, cancel, approve, prescribe and
//! doctor registration.
//!
//! Every outcome is also reported through the notifier; backend messages are
//! shown verbatim.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::backend::{ApiClient, ApiError};
use crate::dashboard::{BookingDisplay, PatientDashboard};
use crate::models::{Appointment, Doctor, Prescription};
use crate::navigation::Notifier;
use crate::validation::{BookingForm, DoctorRegistrationForm, PrescriptionForm, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid form: {0}")]
    Invalid(#[from] ValidationError),
    #[error("You must be signed in to do that")]
    NotSignedIn,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl BookingError {
    pub fn user_message(&self) -> String {
        match self {
            BookingError::Invalid(e) => e.headline().to_string(),
            BookingError::NotSignedIn => self.to_string(),
            BookingError::Api(e) => e.user_message(),
        }
    }
}

pub struct BookingFlow {
    client: Arc<ApiClient>,
    notifier: Arc<dyn Notifier>,
}

impl BookingFlow {
    pub fn new(client: Arc<ApiClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    fn report<T>(&self, result: Result<T, BookingError>) -> Result<T, BookingError> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Booking action failed");
            self.notifier.error(&e.user_message());
        }
        result
    }

    /// Book `doctor` for the signed-in patient.
    ///
    /// A successful booking always starts as pending confirmation.
    pub async fn submit(
        &self,
        form: &BookingForm,
        doctor: &Doctor,
        today: NaiveDate,
    ) -> Result<(Appointment, BookingDisplay), BookingError> {
        let result = async {
            let patient = self
                .client
                .session()
                .current_identity()
                .ok_or(BookingError::NotSignedIn)?;
            form.validate(Some(doctor), today)?;
            let created = self
                .client
                .appointments()
                .book(&form.to_request(&patient, doctor))
                .await?;
            Ok::<_, BookingError>(created)
        }
        .await;

        let created = self.report(result)?;
        self.notifier
            .success("Appointment requested. The doctor will confirm it shortly.");
        let display = BookingDisplay::of(&created, false);
        Ok((created, display))
    }

    /// Cancel an appointment and drop it from `dashboard` without refetching.
    pub async fn cancel(&self, dashboard: &mut PatientDashboard, id: &str) -> Result<(), BookingError> {
        let result = self.client.appointments().cancel(id).await;
        self.report(result.map_err(BookingError::from))?;
        dashboard.remove(id);
        self.notifier.success("Appointment cancelled");
        Ok(())
    }

    /// Doctor approval of a pending request.
    pub async fn approve(&self, id: &str) -> Result<BookingDisplay, BookingError> {
        let result = self.client.appointments().approve(id).await;
        self.report(result.map_err(BookingError::from))?;
        self.notifier.success("Appointment confirmed");
        Ok(BookingDisplay::Confirmed)
    }

    /// Doctor writes a prescription for `appointment`.
    pub async fn prescribe(
        &self,
        appointment: &Appointment,
        form: PrescriptionForm,
    ) -> Result<Prescription, BookingError> {
        let result = async {
            form.validate()?;
            let created = self
                .client
                .prescriptions()
                .create(&form.into_request(appointment))
                .await?;
            Ok::<_, BookingError>(created)
        }
        .await;
        let created = self.report(result)?;
        self.notifier.success("Prescription saved");
        Ok(created)
    }

    /// Doctor self-registration.
    pub async fn register_doctor(&self, form: DoctorRegistrationForm) -> Result<Doctor, BookingError> {
        let result = async {
            form.validate()?;
            let created = self.client.doctors().register(&form.into_request()).await?;
            Ok::<_, BookingError>(created)
        }
        .await;
        let created = self.report(result)?;
        self.notifier.success("Doctor profile created");
        Ok(created)
    }
}
