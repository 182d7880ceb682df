//! Token endpoint client
//!
//! The three HTTP interactions with the identity provider: authorization
//! code exchange, refresh, and the userinfo fetch. Login and logout
//! themselves are browser navigations; this module only builds their URLs.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::config::KeycloakConfig;
use crate::error::AuthError;
use crate::pkce::PkceAttempt;
use crate::types::{OAuthErrorBody, TokenResponse, TokenSet, UserProfile};

/// HTTP client for the Keycloak OpenID Connect endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: KeycloakConfig,
    http: Client,
}

impl OAuthClient {
    /// Create a client for the configured realm.
    #[must_use]
    pub fn new(config: KeycloakConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, http }
    }

    /// Use a custom HTTP client (connection pool reuse, test wiring).
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// The realm configuration this client talks to.
    #[must_use]
    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    /// Build the browser authorization URL for a login attempt.
    #[must_use]
    pub fn authorization_url(&self, attempt: &PkceAttempt) -> String {
        let scope = self.config.scope_string();
        let params: &[(&str, &str)] = &[
            ("client_id", &self.config.client_id),
            ("redirect_uri", &self.config.redirect_uri),
            ("response_type", "code"),
            ("scope", &scope),
            ("code_challenge", &attempt.code_challenge),
            ("code_challenge_method", attempt.challenge_method()),
            ("state", &attempt.state),
        ];

        format!("{}?{}", self.config.authorization_url(), encode_query(params))
    }

    /// Build the browser end-session URL, handing the provider the refresh
    /// token so it can terminate the server-side session.
    #[must_use]
    pub fn end_session_url(&self, refresh_token: &str) -> String {
        let params: &[(&str, &str)] = &[
            ("client_id", &self.config.client_id),
            ("refresh_token", refresh_token),
            ("redirect_uri", &self.config.post_logout_uri),
        ];

        format!("{}?{}", self.config.end_session_url(), encode_query(params))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    /// [`AuthError::TokenExchange`] on a non-success status,
    /// [`AuthError::Http`] on transport failure.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, AuthError> {
        debug!("exchanging authorization code");
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ])
        .await
    }

    /// Obtain a fresh access token from a refresh token.
    ///
    /// # Errors
    /// [`AuthError::TokenExchange`] on a non-success status,
    /// [`AuthError::Http`] on transport failure.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        debug!("refreshing access token");
        self.token_request(&[
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// Fetch the signed-in user's claims from the userinfo endpoint.
    ///
    /// # Errors
    /// [`AuthError::ProfileFetch`] on a non-success status,
    /// [`AuthError::Http`] on transport failure.
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let response = self
            .http
            .get(self.config.userinfo_url())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(AuthError::ProfileFetch { status, detail });
        }

        Ok(response.json::<UserProfile>().await?)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, AuthError> {
        let response = self.http.post(self.config.token_url()).form(params).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(oauth_error) => oauth_error.to_string(),
                Err(_) => body,
            };
            return Err(AuthError::TokenExchange { status, detail });
        }

        let token_response = response.json::<TokenResponse>().await?;
        Ok(token_response.into())
    }
}

fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
