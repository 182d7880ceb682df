//! Error types for the request pipeline

use hubx_auth::AuthError;
use thiserror::Error;

/// Failures surfaced by authenticated API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered 401 even after a refreshed token was presented.
    #[error("request unauthorized after token refresh")]
    Unauthorized,

    /// Any other non-success status; never retried by the pipeline.
    #[error("api returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A session operation (refresh) failed while recovering from a 401.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transport-level failure before any HTTP status was received.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The request could not be prepared or its response decoded.
    #[error("client error: {0}")]
    Client(String),
}
