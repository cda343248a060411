use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::client::{join_segments, parse_base_url};
use super::error::{extract_message, ApiError};
use crate::config::ClientConfig;
use crate::session::TokenIssuer;

#[derive(Serialize)]
struct TokenRequest<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Token issuer backed by `POST /jwt`.
///
/// Uses its own plain client: the exchange happens before any token exists,
/// so it must not pass through the authenticated interceptors.
pub struct HttpTokenIssuer {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTokenIssuer {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: parse_base_url(&config.api_base_url)?,
        })
    }
}

#[async_trait]
impl TokenIssuer for HttpTokenIssuer {
    async fn issue(&self, email: &str) -> Result<Option<String>, ApiError> {
        let url = join_segments(&self.base_url, &["jwt"])?;
        let response = self
            .http
            .post(url)
            .json(&TokenRequest { email })
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.base_url.as_str()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ResponseParsing(e.to_string()))?;
        Ok(parsed.token.filter(|t| !t.is_empty()))
    }
}
