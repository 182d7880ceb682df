//! Routing-guard and callback-route collaborators
//!
//! The hosting shell's router calls into these before entering a protected
//! route and when the provider redirects back to the callback route. They
//! hold the ordering guarantee: initialization completes before any guard
//! decision is made, so a freshly booted authenticated user is never
//! mistaken for an unauthenticated one.

use tracing::{error, warn};

use crate::error::AuthError;
use crate::session::{CallbackParams, SessionManager};
use crate::store::CredentialStore;

/// Decision for a route that requires authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The session is authenticated; let the navigation proceed.
    Granted,

    /// A login redirect was issued; the current navigation is abandoned.
    RedirectedToLogin,
}

/// Gate a navigation into a protected route.
///
/// Awaits initialization, then grants authenticated sessions. A session
/// holding only an access token (profile lost, e.g. after a reload that
/// restored tokens but not claims) gets one recovery attempt through the
/// userinfo endpoint before the guard falls back to a full login redirect.
///
/// # Errors
/// Returns an error when initialization itself fails against the credential
/// store; auth failures inside recovery resolve to a login redirect instead.
pub async fn authorize_route<S: CredentialStore + 'static>(
    manager: &SessionManager<S>,
) -> Result<GuardOutcome, AuthError> {
    manager.initialize().await?;

    if manager.is_authenticated().await {
        return Ok(GuardOutcome::Granted);
    }

    if manager.access_token().await.is_some() {
        match manager.fetch_profile().await {
            Ok(_) => return Ok(GuardOutcome::Granted),
            Err(err) => {
                warn!(error = %err, "token-based recovery failed, starting login");
            }
        }
    }

    manager.begin_login().await?;
    Ok(GuardOutcome::RedirectedToLogin)
}

/// Drive the callback route: handle the provider redirect, load the user
/// profile, then leave for the application root. On failure the browser is
/// sent to the login entry point and the error is surfaced so the shell can
/// show a notice.
///
/// # Errors
/// Propagates callback-handling and profile-fetch failures after issuing
/// the login-route navigation.
pub async fn complete_callback<S: CredentialStore + 'static>(
    manager: &SessionManager<S>,
    query: &str,
) -> Result<(), AuthError> {
    let params = CallbackParams::from_query(query);

    let outcome = async {
        manager.handle_callback(&params).await?;
        manager.fetch_profile().await?;
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => {
            manager.navigator().replace_route(&manager.config().root_route);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "login callback failed");
            manager.navigator().replace_route(&manager.config().login_route);
            Err(err)
        }
    }
}
