use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Date format used by the backend for appointment dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Slot label format, e.g. "10:30 AM".
pub const TIME_FORMAT: &str = "%I:%M %p";

/// A booked appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(rename = "_id")]
    pub id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_id: String,
    pub doctor_name: String,
    #[serde(default)]
    pub doctor_email: Option<String>,
    /// YYYY-MM-DD
    pub date: String,
    /// Slot label, e.g. "10:30 AM".
    pub time: String,
    pub problem: String,
    /// Approval flag. Only a doctor's approval sets it.
    #[serde(default)]
    pub booking: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Appointment {
    /// Parsed appointment date, `None` when the backend sent something odd.
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    pub fn slot(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), TIME_FORMAT).ok()
    }

    pub fn is_approved(&self) -> bool {
        self.booking
    }
}

/// Booking request (`POST /appointments`). `booking` is always sent false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub doctor_email: String,
    pub date: String,
    pub time: String,
    pub problem: String,
    pub booking: bool,
}
