use serde::{Deserialize, Serialize};

/// A doctor profile as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Correlates the record with an `Identity`.
    pub email: String,
    pub specialization: String,
    #[serde(default)]
    pub bio: String,
    /// Free text, e.g. "12 years".
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub image: Option<String>,
    /// Flat slot labels such as "10:30 AM".
    #[serde(default)]
    pub available_time_slots: Vec<String>,
}

impl Doctor {
    pub fn offers_slot(&self, time: &str) -> bool {
        self.available_time_slots
            .iter()
            .any(|slot| slot.trim().eq_ignore_ascii_case(time.trim()))
    }
}

/// Self-registration payload (`POST /doctors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub specialization: String,
    pub bio: String,
    pub experience: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub available_time_slots: Vec<String>,
}

/// Partial profile update (`PUT /doctors/:id`). Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_time_slots: Option<Vec<String>>,
}
