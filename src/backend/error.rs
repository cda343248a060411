//! Backend call errors.

/// Case-insensitive markers of a 401 caused by the session token itself
/// (as opposed to a permission problem).
const SESSION_FAILURE_MARKERS: &[&str] = &["unauthorized", "token", "jwt"];

/// Errors from calls to the booking backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Cannot reach backend at {0}")]
    Connection(String),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP client error: {0}")]
    Http(String),
    /// 401 naming the token; the session has been signed out.
    #[error("Session expired: {message}")]
    SessionExpired { message: String },
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    /// 2xx response with `success: false`.
    #[error("{0}")]
    Rejected(String),
    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_connect() {
            ApiError::Connection(base_url.to_string())
        } else if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::ResponseParsing(err.to_string())
        } else {
            ApiError::Http(err.to_string())
        }
    }

    /// HTTP status, when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionExpired { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired { .. })
    }

    /// Text for a toast. Backend messages are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } | ApiError::Rejected(message)
                if !message.is_empty() =>
            {
                message.clone()
            }
            ApiError::SessionExpired { .. } => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ApiError::Connection(_) | ApiError::Timeout => {
                "The server could not be reached. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Whether a 401 message names the session token.
pub fn is_session_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    SESSION_FAILURE_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Pull the human-readable message out of an error body.
///
/// Prefers `message`, then `error`, then the raw body.
pub fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["message", "error"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}
