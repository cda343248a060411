use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Medibook";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage key holding the backend session token.
pub const TOKEN_KEY: &str = "access-token";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medibook=info"
}

/// Get the application data directory (~/.medibook/).
///
/// Falls back to the current directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".medibook")
}

/// Errors from loading configuration overrides.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Client configuration.
///
/// Every timing knob of the session handshake lives here so tests can
/// shrink them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the booking backend.
    pub api_base_url: String,
    /// Directory of the durable key-value store.
    pub storage_dir: PathBuf,
    /// Key under which the session token is stored.
    pub token_key: String,
    /// Pause after persisting a token before a sign-in is reported complete.
    pub settle_delay_ms: u64,
    /// Readiness wait granularity for outgoing requests.
    pub ready_poll_interval_ms: u64,
    /// Readiness wait attempts before a request proceeds anyway.
    pub ready_max_attempts: u32,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Location of the login view.
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            storage_dir: app_data_dir(),
            token_key: TOKEN_KEY.to_string(),
            settle_delay_ms: 100,
            ready_poll_interval_ms: 200,
            ready_max_attempts: 25,
            request_timeout_secs: 30,
            login_path: "/login".to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `MEDIBOOK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup("MEDIBOOK_API_URL") {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup("MEDIBOOK_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("MEDIBOOK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs =
                raw.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "MEDIBOOK_REQUEST_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
        }
        Ok(config)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Upper bound a request waits for token readiness
    /// (poll interval times attempts, 5s by default).
    pub fn readiness_bound(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms) * self.ready_max_attempts
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
