//! Error types for the session core

use thiserror::Error;

/// Failures surfaced by the authentication/session lifecycle.
///
/// Token-exchange and profile-fetch failures tear the session down before
/// they are returned, so callers never observe an authenticated-but-invalid
/// session.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The callback URL carried no authorization code.
    #[error("no authorization code found in callback")]
    InvalidCallback,

    /// Callback state did not match the stored login attempt.
    ///
    /// Only returned when strict state validation is enabled; the default
    /// policy logs a warning and proceeds.
    #[error("state mismatch: expected {expected}, received {received}")]
    StateMismatch { expected: String, received: String },

    /// A refresh was requested but no refresh token is held.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// An operation needed an access token but none is held.
    #[error("no access token available")]
    NoAccessToken,

    /// The token endpoint answered with a non-success status.
    #[error("token endpoint returned {status}: {detail}")]
    TokenExchange { status: u16, detail: String },

    /// The userinfo endpoint answered with a non-success status.
    #[error("userinfo endpoint returned {status}: {detail}")]
    ProfileFetch { status: u16, detail: String },

    /// The credential store failed to read or write.
    #[error("credential store error: {0}")]
    Storage(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure before any HTTP status was received.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}
