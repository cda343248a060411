//! Form validation for booking, doctor registration and prescriptions.
//!
//! Each form reports every failing field at once so the view can mark
//! them all, then converts into the matching backend request.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::appointment::DATE_FORMAT;
use crate::models::{
    Appointment, Doctor, Identity, Medication, NewAppointment, NewDoctor, NewPrescription,
};

pub const MIN_PROBLEM_LEN: usize = 10;
pub const MIN_BIO_LEN: usize = 20;

/// Slot label: "9:00 AM", "10:30 pm".
static TIME_SLOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(1[0-2]|0?[1-9]):[0-5][0-9]\s?(AM|PM)$").unwrap());

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Shape check only; the identity provider owns real verification.
static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub fn is_time_slot(value: &str) -> bool {
    TIME_SLOT.is_match(value.trim())
}

pub fn is_email(value: &str) -> bool {
    EMAIL_SHAPE.is_match(value.trim())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if !DATE_SHAPE.is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} field(s) invalid: {}", .errors.len(), field_list(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn field_list(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// First message, for a single toast.
    pub fn headline(&self) -> &str {
        self.errors
            .first()
            .map(|e| e.message.as_str())
            .unwrap_or("Please check the form")
    }
}

#[derive(Default)]
struct Checks {
    errors: Vec<FieldError>,
}

impl Checks {
    fn check(&mut self, ok: bool, field: impl Into<String>, message: impl Into<String>) {
        if !ok {
            self.errors.push(FieldError {
                field: field.into(),
                message: message.into(),
            });
        }
    }

    fn required(&mut self, value: &str, field: impl Into<String>, label: &str) {
        self.check(!value.trim().is_empty(), field, format!("{label} is required"));
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Booking
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub doctor_id: String,
    /// YYYY-MM-DD
    pub date: String,
    pub time: String,
    pub problem: String,
}

impl BookingForm {
    /// Validate against `today` and, when known, the doctor's offered slots.
    pub fn validate(&self, doctor: Option<&Doctor>, today: NaiveDate) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        checks.required(&self.doctor_id, "doctorId", "Doctor");

        match parse_date(&self.date) {
            Some(day) => checks.check(day >= today, "date", "Date cannot be in the past"),
            None => checks.check(false, "date", "Date must be in YYYY-MM-DD format"),
        }

        if !is_time_slot(&self.time) {
            checks.check(false, "time", "Time must look like 10:30 AM");
        } else if let Some(doctor) = doctor {
            if !doctor.available_time_slots.is_empty() {
                checks.check(
                    doctor.offers_slot(&self.time),
                    "time",
                    format!("{} is not available at {}", doctor.name, self.time.trim()),
                );
            }
        }

        checks.check(
            self.problem.trim().chars().count() >= MIN_PROBLEM_LEN,
            "problem",
            format!("Please describe the problem in at least {MIN_PROBLEM_LEN} characters"),
        );
        checks.finish()
    }

    /// Booking request for `patient` with `doctor`; always unapproved.
    pub fn to_request(&self, patient: &Identity, doctor: &Doctor) -> NewAppointment {
        NewAppointment {
            patient_name: patient.label().to_string(),
            patient_email: patient.email.clone(),
            doctor_id: doctor.id.clone(),
            doctor_name: doctor.name.clone(),
            doctor_email: doctor.email.clone(),
            date: self.date.trim().to_string(),
            time: self.time.trim().to_string(),
            problem: self.problem.trim().to_string(),
            booking: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Doctor registration
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRegistrationForm {
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub experience: String,
    pub bio: String,
    #[serde(default)]
    pub image: Option<String>,
    pub available_time_slots: Vec<String>,
}

impl DoctorRegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        checks.required(&self.name, "name", "Name");
        checks.check(is_email(&self.email), "email", "Enter a valid email address");
        checks.required(&self.specialization, "specialization", "Specialization");
        checks.required(&self.experience, "experience", "Experience");
        checks.check(
            self.bio.trim().chars().count() >= MIN_BIO_LEN,
            "bio",
            format!("Bio must be at least {MIN_BIO_LEN} characters"),
        );
        checks.check(
            !self.available_time_slots.is_empty(),
            "availableTimeSlots",
            "Add at least one time slot",
        );
        for (i, slot) in self.available_time_slots.iter().enumerate() {
            checks.check(
                is_time_slot(slot),
                format!("availableTimeSlots[{i}]"),
                format!("'{slot}' is not a valid time slot"),
            );
        }
        checks.finish()
    }

    pub fn into_request(self) -> NewDoctor {
        NewDoctor {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            specialization: self.specialization.trim().to_string(),
            bio: self.bio.trim().to_string(),
            experience: self.experience.trim().to_string(),
            image: self.image.filter(|i| !i.trim().is_empty()),
            available_time_slots: self
                .available_time_slots
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Prescription
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionForm {
    pub medications: Vec<Medication>,
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub advice: String,
    #[serde(default)]
    pub follow_up: Option<String>,
}

impl PrescriptionForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        checks.check(
            !self.medications.is_empty(),
            "medications",
            "Add at least one medication",
        );
        for (i, med) in self.medications.iter().enumerate() {
            checks.required(&med.name, format!("medications[{i}].name"), "Medication name");
            checks.required(&med.dosage, format!("medications[{i}].dosage"), "Dosage");
            checks.required(&med.frequency, format!("medications[{i}].frequency"), "Frequency");
            checks.required(&med.duration, format!("medications[{i}].duration"), "Duration");
        }
        checks.required(&self.diagnosis, "diagnosis", "Diagnosis");
        if let Some(follow_up) = self.follow_up.as_deref().filter(|f| !f.trim().is_empty()) {
            checks.check(
                parse_date(follow_up).is_some(),
                "followUp",
                "Follow-up must be in YYYY-MM-DD format",
            );
        }
        checks.finish()
    }

    /// Prescription for `appointment`, copying its patient and doctor names.
    pub fn into_request(self, appointment: &Appointment) -> NewPrescription {
        NewPrescription {
            appointment_id: appointment.id.clone(),
            patient_name: appointment.patient_name.clone(),
            patient_email: appointment.patient_email.clone(),
            doctor_id: appointment.doctor_id.clone(),
            doctor_name: appointment.doctor_name.clone(),
            medications: self.medications,
            diagnosis: self.diagnosis.trim().to_string(),
            symptoms: self.symptoms.trim().to_string(),
            advice: self.advice.trim().to_string(),
            follow_up: self.follow_up.filter(|f| !f.trim().is_empty()),
        }
    }
}
