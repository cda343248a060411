use serde::{Deserialize, Serialize};

/// The externally authenticated principal.
///
/// Issued by the identity provider; the client only observes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-issued identifier.
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Same principal (display name changes do not count).
    pub fn same_principal(&self, other: &Identity) -> bool {
        self.uid == other.uid && self.email == other.email
    }

    /// Name for greetings and denormalized record fields.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}
