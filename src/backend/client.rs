//! Authenticated HTTP client for the booking backend.
//!
//! Request side: while an identity is present but its token exchange is
//! still in flight, a request waits (bounded) for readiness, then attaches
//! whatever token storage holds at send time, or none.
//!
//! Response side: a 401 whose message names the token signs the session out
//! and redirects to login. Every other failure passes through untouched and
//! nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::envelope::Envelope;
use super::error::{extract_message, is_session_failure, ApiError};
use crate::config::ClientConfig;
use crate::navigation::{Navigator, Redirect};
use crate::session::SessionSource;
use crate::storage::TokenStore;

/// Parse a base URL, tolerating a trailing slash.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim_end_matches('/')).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ApiError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Append path segments (each percent-encoded) to `base`.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// HTTP client that carries the session token.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionSource>,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    readiness_bound: Duration,
    login_path: String,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionSource>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: parse_base_url(&config.api_base_url)?,
            session,
            store,
            navigator,
            readiness_bound: config.readiness_bound(),
            login_path: config.login_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionSource> {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        join_segments(&self.base_url, segments)
    }

    // ── Typed calls ─────────────────────────────────────────

    /// GET a bare JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self.execute(self.http.get(url).query(query)).await?;
        decode(response).await
    }

    /// GET an enveloped payload.
    pub async fn get_data<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.get_json::<Envelope>(segments, query)
            .await?
            .into_data()
    }

    /// POST a JSON body, returning the enveloped payload.
    pub async fn post_data<B, T>(&self, segments: &[&str], body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        let response = self.execute(self.http.post(url).json(body)).await?;
        decode::<Envelope>(response).await?.into_data()
    }

    /// PUT a JSON body, expecting a success acknowledgement.
    pub async fn put_ack<B>(&self, segments: &[&str], body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(segments)?;
        let response = self.execute(self.http.put(url).json(body)).await?;
        decode::<Envelope>(response)
            .await?
            .into_ack()
    }

    /// DELETE, expecting a success acknowledgement.
    pub async fn delete_ack(&self, segments: &[&str]) -> Result<(), ApiError> {
        let url = self.endpoint(segments)?;
        let response = self.execute(self.http.delete(url)).await?;
        decode::<Envelope>(response)
            .await?
            .into_ack()
    }

    // ── Interceptors ────────────────────────────────────────

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        self.await_readiness().await;

        // Read storage at send time, never earlier.
        let request = match self.store.load() {
            Ok(Some(token)) => request.bearer_auth(token),
            Ok(None) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Token storage unreadable, sending without credentials");
                request
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.base_url.as_str()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body);

        if status == StatusCode::UNAUTHORIZED && is_session_failure(&message) {
            self.expire_session(&path, &message).await;
            return Err(ApiError::SessionExpired { message });
        }

        tracing::debug!(status = status.as_u16(), path = %path, message = %message, "Backend error");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Hold the request while the current identity's token is in flight.
    async fn await_readiness(&self) {
        if self.session.current_identity().is_none() || self.session.readiness().is_ready() {
            return;
        }
        let observed = self
            .session
            .bridge()
            .wait_settled(self.readiness_bound)
            .await;
        tracing::debug!(?observed, "Request released after readiness wait");
    }

    async fn expire_session(&self, path: &str, message: &str) {
        tracing::warn!(path = %path, message = %message, "Session token rejected, signing out");
        self.session.bridge().invalidate_token();
        if let Err(e) = self.session.sign_out().await {
            tracing::warn!(error = %e, "Sign-out after token rejection failed");
        }
        self.navigator.redirect(Redirect::new(&self.login_path));
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::ResponseParsing(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::ResponseParsing(e.to_string()))
}
