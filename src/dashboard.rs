//! Dashboard views: appointments bucketed for display.
//!
//! Classification is pure; the `fetch` helpers only gather the two lists it
//! needs.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::backend::{ApiClient, ApiError};
use crate::models::{Appointment, Prescription};

/// What the patient sees next to an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingDisplay {
    PendingConfirmation,
    Confirmed,
    Completed,
}

impl BookingDisplay {
    pub fn of(appointment: &Appointment, prescribed: bool) -> Self {
        if prescribed {
            BookingDisplay::Completed
        } else if appointment.is_approved() {
            BookingDisplay::Confirmed
        } else {
            BookingDisplay::PendingConfirmation
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingDisplay::PendingConfirmation => "Pending Confirmation",
            BookingDisplay::Confirmed => "Confirmed",
            BookingDisplay::Completed => "Completed",
        }
    }
}

fn prescribed_ids(prescriptions: &[Prescription]) -> HashSet<&str> {
    prescriptions
        .iter()
        .map(|p| p.appointment_id.as_str())
        .collect()
}

/// Soonest first; unparseable dates and times sort last.
fn sort_ascending(items: &mut [Appointment]) {
    items.sort_by_key(|a| (a.day().is_none(), a.day(), a.slot().is_none(), a.slot()));
}

/// Most recent first.
fn sort_descending(items: &mut [Appointment]) {
    items.sort_by(|a, b| (b.day(), b.slot()).cmp(&(a.day(), a.slot())));
}

// ═══════════════════════════════════════════════════════════
// Patient
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientDashboard {
    /// Approved, today or later.
    pub upcoming: Vec<Appointment>,
    /// Awaiting the doctor's approval, today or later.
    pub pending: Vec<Appointment>,
    /// Before today with no prescription.
    pub past: Vec<Appointment>,
    /// A prescription references it ("previous"), whatever its date.
    pub prescribed: Vec<Appointment>,
}

/// Bucket a patient's appointments relative to `today`.
///
/// A prescription wins over the date. A date that does not parse is never
/// treated as past, so the appointment stays visible under upcoming/pending.
pub fn classify(
    appointments: Vec<Appointment>,
    prescriptions: &[Prescription],
    today: NaiveDate,
) -> PatientDashboard {
    let prescribed = prescribed_ids(prescriptions);
    let mut dashboard = PatientDashboard::default();

    for appointment in appointments {
        if prescribed.contains(appointment.id.as_str()) {
            dashboard.prescribed.push(appointment);
            continue;
        }
        let is_past = appointment.day().is_some_and(|day| day < today);
        if is_past {
            dashboard.past.push(appointment);
        } else if appointment.is_approved() {
            dashboard.upcoming.push(appointment);
        } else {
            dashboard.pending.push(appointment);
        }
    }

    sort_ascending(&mut dashboard.upcoming);
    sort_ascending(&mut dashboard.pending);
    sort_descending(&mut dashboard.past);
    sort_descending(&mut dashboard.prescribed);
    dashboard
}

impl PatientDashboard {
    /// Fetch and classify the appointments of `email`.
    pub async fn fetch(client: &ApiClient, email: &str, today: NaiveDate) -> Result<Self, ApiError> {
        let appointments = client.appointments().list(Some(email)).await?;
        let prescriptions = client.prescriptions().for_patient(email).await?;
        tracing::debug!(
            appointments = appointments.len(),
            prescriptions = prescriptions.len(),
            "Patient dashboard loaded"
        );
        Ok(classify(appointments, &prescriptions, today))
    }

    /// Drop an appointment from every bucket. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let mut removed = false;
        for bucket in [
            &mut self.upcoming,
            &mut self.pending,
            &mut self.past,
            &mut self.prescribed,
        ] {
            let before = bucket.len();
            bucket.retain(|a| a.id != id);
            removed |= bucket.len() != before;
        }
        removed
    }

    /// Display status of an appointment on this dashboard.
    pub fn display_of(&self, id: &str) -> Option<BookingDisplay> {
        if self.prescribed.iter().any(|a| a.id == id) {
            return Some(BookingDisplay::Completed);
        }
        [&self.upcoming, &self.pending, &self.past]
            .into_iter()
            .flatten()
            .find(|a| a.id == id)
            .map(|a| BookingDisplay::of(a, false))
    }

    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty()
            && self.pending.is_empty()
            && self.past.is_empty()
            && self.prescribed.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// Doctor
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DoctorDashboard {
    /// Requests awaiting approval.
    pub pending_requests: Vec<Appointment>,
    /// Approved, no prescription yet.
    pub confirmed: Vec<Appointment>,
    /// Prescription written.
    pub completed: Vec<Appointment>,
}

impl DoctorDashboard {
    pub fn build(appointments: Vec<Appointment>, prescriptions: &[Prescription]) -> Self {
        let prescribed = prescribed_ids(prescriptions);
        let mut dashboard = DoctorDashboard::default();
        for appointment in appointments {
            match BookingDisplay::of(&appointment, prescribed.contains(appointment.id.as_str())) {
                BookingDisplay::PendingConfirmation => dashboard.pending_requests.push(appointment),
                BookingDisplay::Confirmed => dashboard.confirmed.push(appointment),
                BookingDisplay::Completed => dashboard.completed.push(appointment),
            }
        }
        sort_ascending(&mut dashboard.pending_requests);
        sort_ascending(&mut dashboard.confirmed);
        sort_descending(&mut dashboard.completed);
        dashboard
    }

    pub async fn fetch(client: &ApiClient, doctor_id: &str) -> Result<Self, ApiError> {
        let appointments = client.appointments().for_doctor(doctor_id).await?;
        let prescriptions = client.prescriptions().for_doctor(doctor_id).await?;
        Ok(Self::build(appointments, &prescriptions))
    }
}
