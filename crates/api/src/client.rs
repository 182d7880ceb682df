//! Bearer-authenticated request pipeline
//!
//! Every backend call goes through [`ApiClient`]: the current access token
//! is attached on the way out, and a 401 on the way back triggers exactly
//! one refresh-and-retry for that logical request. Non-401 failures are
//! never intercepted here.

use std::time::Duration;

use hubx_auth::{CredentialStore, SessionManager};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;

/// Configuration for the backend API client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL the console's backend is served under
    /// (e.g. `https://console.example.com/api`).
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiClientConfig {
    /// Configuration with the default 10-second timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), timeout: Duration::from_secs(10) }
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client that injects the session's bearer token and recovers from a
/// single 401 per request.
pub struct ApiClient<S: CredentialStore + 'static> {
    http: Client,
    sessions: SessionManager<S>,
    config: ApiClientConfig,
}

impl<S: CredentialStore + 'static> ApiClient<S> {
    /// Create a client over the given session manager.
    #[must_use]
    pub fn new(config: ApiClientConfig, sessions: SessionManager<S>) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { http, sessions, config }
    }

    /// The session manager backing this client.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    /// Build a request for an API path (leading slash expected).
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        self.http.request(method, url)
    }

    /// Execute a request with bearer injection and the single 401
    /// refresh-and-retry.
    ///
    /// The original request is cloned up front so the retry replays it
    /// exactly; streaming bodies cannot be retried and are rejected. Retry
    /// bookkeeping lives in this call frame only: whatever happens to the
    /// retried request is final.
    ///
    /// # Errors
    /// A refresh failure during recovery propagates as [`ApiError::Auth`];
    /// transport failures as [`ApiError::Http`]. A non-401 status is not an
    /// error at this layer; the typed helpers map those.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let retry = request.try_clone().ok_or_else(|| {
            ApiError::Client(
                "request body cannot be cloned; buffer the body to enable the 401 retry".into(),
            )
        })?;

        let response = self.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("received 401, refreshing session and retrying once");
        self.sessions.refresh().await?;
        self.execute(retry).await
    }

    /// Attach the current access token (if any) and dispatch.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.sessions.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        Ok(request.send().await?)
    }

    /// GET a JSON resource.
    ///
    /// # Errors
    /// [`ApiError::Unauthorized`] when a 401 survives the retry,
    /// [`ApiError::Status`] for other non-success statuses.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    /// POST a JSON body, decoding a JSON response.
    ///
    /// # Errors
    /// As for [`ApiClient::get`].
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }

    /// DELETE a resource, ignoring any response body.
    ///
    /// # Errors
    /// As for [`ApiClient::get`].
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self.send(self.request(Method::DELETE, path)).await?;
        ensure_success(response).await.map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    response
        .json()
        .await
        .map_err(|err| ApiError::Client(format!("failed to decode response: {err}")))
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}
