use serde::{Deserialize, Serialize};

/// One medication line of a prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// A prescription written against one appointment.
///
/// Patient and doctor names are denormalized copies for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(rename = "_id")]
    pub id: String,
    pub appointment_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub medications: Vec<Medication>,
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub advice: String,
    #[serde(default)]
    pub follow_up: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Creation payload (`POST /prescriptions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrescription {
    pub appointment_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub doctor_id: String,
    pub doctor_name: String,
    pub medications: Vec<Medication>,
    pub diagnosis: String,
    pub symptoms: String,
    pub advice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}
