//! Keycloak OAuth2 + PKCE session lifecycle for the HubX admin console
//!
//! This crate is the authentication core behind the console: it drives the
//! Authorization Code flow with PKCE against a Keycloak realm, keeps the
//! resulting session alive with proactive refreshes, and tears everything
//! down on logout or unrecoverable failure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  SessionManager  │  lifecycle orchestrator, sole session writer
//! └────────┬─────────┘
//!          ├──► OAuthClient        (token endpoint + userinfo HTTP)
//!          ├──► CredentialStore    (persisted token/profile triple)
//!          ├──► RefreshScheduler   (single proactive refresh timer)
//!          ├──► Navigator          (browser navigation seam)
//!          └──► pkce               (verifier/challenge/state per attempt)
//! ```
//!
//! The routing guard ([`guard::authorize_route`]) and the request pipeline
//! (crate `hubx-api`) are read-only consumers of the session.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hubx_auth::{FileCredentialStore, KeycloakConfig, Navigator, SessionManager};
//!
//! struct ShellNavigator;
//!
//! impl Navigator for ShellNavigator {
//!     fn redirect_external(&self, _url: &str) { /* hand to the webview */ }
//!     fn replace_route(&self, _route: &str) { /* hand to the router */ }
//!     fn strip_query(&self) { /* rewrite the visible URL */ }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = KeycloakConfig::new(
//!         "https://id.example.com/auth",
//!         "hubx",
//!         "admin-console",
//!         "https://console.example.com/callback",
//!     );
//!
//!     let store = FileCredentialStore::new("/var/lib/hubx/credentials.json");
//!     let manager = SessionManager::new(config, store, Arc::new(ShellNavigator));
//!
//!     // Before any guarded route is entered:
//!     manager.initialize().await?;
//!
//!     if !manager.is_authenticated().await {
//!         manager.begin_login().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod navigator;
pub mod pkce;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod testing;
pub mod types;

pub use client::OAuthClient;
pub use config::KeycloakConfig;
pub use error::AuthError;
pub use guard::{authorize_route, complete_callback, GuardOutcome};
pub use navigator::Navigator;
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, validate_state, PkceAttempt,
};
pub use scheduler::RefreshScheduler;
pub use session::{CallbackParams, SessionManager};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use types::{PersistedSession, Session, TokenResponse, TokenSet, UserProfile};
