use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;

/// Response wrapper used by every list/detail endpoint:
/// `{ success, data, message }`.
///
/// `data` stays raw until the caller names its type, so a `null` payload
/// decodes into `Option<_>` instead of being mistaken for a missing one.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl Envelope {
    fn check(&self) -> Result<(), ApiError> {
        if self.success == Some(false) {
            return Err(ApiError::Rejected(
                self.message
                    .clone()
                    .unwrap_or_else(|| "Request was rejected".to_string()),
            ));
        }
        Ok(())
    }

    /// The payload, or the backend's rejection.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        self.check()?;
        serde_json::from_value(self.data)
            .map_err(|e| ApiError::ResponseParsing(format!("response data: {e}")))
    }

    /// Success acknowledgement; the payload (if any) is ignored.
    pub fn into_ack(self) -> Result<(), ApiError> {
        self.check()
    }
}
