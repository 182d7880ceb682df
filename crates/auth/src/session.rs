//! Session lifecycle orchestration
//!
//! The session manager owns the session state machine:
//!
//! ```text
//! Unauthenticated ──(login redirect)──► AwaitingCallback
//!     ▲                                      │
//!     │                              (code exchange + profile)
//!     │                                      ▼
//!     └──(logout | refresh failure)──── Authenticated
//! ```
//!
//! plus the direct boot transition when persisted credentials restore and a
//! validating refresh succeeds. It is the sole writer of the session and of
//! the credential store; everything else reads snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, error, info, warn};

use crate::client::OAuthClient;
use crate::config::KeycloakConfig;
use crate::error::AuthError;
use crate::navigator::Navigator;
use crate::pkce::{self, PkceAttempt};
use crate::scheduler::{refresh_delay, RefreshScheduler};
use crate::store::CredentialStore;
use crate::types::{Session, TokenSet, UserProfile};

/// `code` and `state` extracted from the callback URL.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Parse the relevant parameters out of a query string, with or without
    /// the leading `?`.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Orchestrator for login, callback handling, refresh, and logout.
pub struct SessionManager<S: CredentialStore + 'static> {
    client: Arc<OAuthClient>,
    store: Arc<S>,
    navigator: Arc<dyn Navigator>,
    session: Arc<RwLock<Session>>,
    scheduler: Arc<RefreshScheduler>,
    refresh_gate: Arc<Mutex<()>>,
    refresh_epoch: Arc<AtomicU64>,
    init: Arc<OnceCell<()>>,
}

impl<S: CredentialStore + 'static> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
            navigator: Arc::clone(&self.navigator),
            session: Arc::clone(&self.session),
            scheduler: Arc::clone(&self.scheduler),
            refresh_gate: Arc::clone(&self.refresh_gate),
            refresh_epoch: Arc::clone(&self.refresh_epoch),
            init: Arc::clone(&self.init),
        }
    }
}

impl<S: CredentialStore + 'static> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("realm", &self.config().realm)
            .field("client_id", &self.config().client_id)
            .finish_non_exhaustive()
    }
}

impl<S: CredentialStore + 'static> SessionManager<S> {
    /// Create a session manager for a realm.
    #[must_use]
    pub fn new(config: KeycloakConfig, store: S, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_client(OAuthClient::new(config), store, navigator)
    }

    /// Create a session manager around an existing token client.
    #[must_use]
    pub fn with_client(client: OAuthClient, store: S, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client: Arc::new(client),
            store: Arc::new(store),
            navigator,
            session: Arc::new(RwLock::new(Session::default())),
            scheduler: Arc::new(RefreshScheduler::new()),
            refresh_gate: Arc::new(Mutex::new(())),
            refresh_epoch: Arc::new(AtomicU64::new(0)),
            init: Arc::new(OnceCell::new()),
        }
    }

    /// The realm configuration in use.
    #[must_use]
    pub fn config(&self) -> &KeycloakConfig {
        self.client.config()
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Whether a user profile has been established.
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    /// The current access token, if any.
    pub async fn access_token(&self) -> Option<String> {
        self.session.read().await.access_token.clone()
    }

    /// Whether a proactive refresh is currently scheduled.
    #[must_use]
    pub fn has_pending_refresh(&self) -> bool {
        self.scheduler.is_armed()
    }

    pub(crate) fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    /// Restore the session from persisted credentials, validating them with
    /// a single refresh. Idempotent: concurrent and repeated callers await
    /// the one underlying initialization. Must complete before any guarded
    /// navigation proceeds.
    ///
    /// A restore whose validating refresh fails ends unauthenticated with
    /// the persisted credentials erased; that is not an error here.
    ///
    /// # Errors
    /// Returns an error only when the credential store itself fails.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        let this = self.clone();
        self.init.get_or_try_init(move || async move { this.run_initialize().await }).await?;
        Ok(())
    }

    async fn run_initialize(&self) -> Result<(), AuthError> {
        if self.config().dev_bypass {
            return self.install_dev_identity().await;
        }

        let Some(persisted) = self.store.load().await? else {
            debug!("no persisted credentials, starting unauthenticated");
            return Ok(());
        };
        if !persisted.is_restorable() {
            debug!("incomplete persisted credentials, starting unauthenticated");
            return Ok(());
        }

        {
            let mut session = self.session.write().await;
            session.access_token = persisted.access_token.clone();
            session.refresh_token = persisted.refresh_token.clone();
            session.roles = persisted
                .user_profile
                .as_ref()
                .map(UserProfile::role_names)
                .unwrap_or_default();
            session.profile = persisted.user_profile;
        }
        info!("restored persisted session, validating with a refresh");

        if let Err(err) = self.refresh().await {
            warn!(error = %err, "persisted session failed validation");
            return Ok(());
        }
        if let Err(err) = self.fetch_profile().await {
            warn!(error = %err, "profile re-fetch after restore failed");
        }
        Ok(())
    }

    /// Start the login flow: generate and park a PKCE attempt, drop any
    /// existing credentials, and send the browser to the authorization
    /// endpoint. Navigation is terminal for the current page, so there is
    /// nothing to return.
    ///
    /// # Errors
    /// Returns an error when the credential store fails.
    pub async fn begin_login(&self) -> Result<(), AuthError> {
        if self.config().dev_bypass {
            self.navigator.replace_route(&self.config().root_route);
            return Ok(());
        }

        let attempt = PkceAttempt::generate();

        self.scheduler.cancel();
        self.session.write().await.clear();
        self.store.clear().await?;
        self.store.save_attempt(&attempt).await?;

        let url = self.client.authorization_url(&attempt);
        info!("redirecting to authorization endpoint");
        self.navigator.redirect_external(&url);
        Ok(())
    }

    /// Handle the provider's redirect back to the callback route: consume
    /// the parked attempt, exchange the code, persist the tokens, arm the
    /// proactive refresh, and scrub `code`/`state` from the visible URL.
    ///
    /// A state mismatch is logged and tolerated by default: refreshing the
    /// callback page loses the parked attempt, and failing hard there
    /// bounces the user back through the provider for nothing. Deployments
    /// wanting the hard CSRF guarantee set
    /// [`KeycloakConfig::strict_state_validation`].
    ///
    /// # Errors
    /// [`AuthError::InvalidCallback`] when no code is present,
    /// [`AuthError::StateMismatch`] under strict validation, or the
    /// exchange's own failure.
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<(), AuthError> {
        let attempt = self.store.take_attempt().await?;

        let received_state = params.state.as_deref().unwrap_or_default();
        let expected_state = attempt.as_ref().map_or("", |a| a.state.as_str());
        if !pkce::validate_state(expected_state, received_state) {
            if self.config().strict_state_validation {
                return Err(AuthError::StateMismatch {
                    expected: expected_state.to_string(),
                    received: received_state.to_string(),
                });
            }
            warn!(
                expected = expected_state,
                received = received_state,
                "callback state mismatch, continuing with exchange"
            );
        }

        let Some(code) = params.code.as_deref() else {
            return Err(AuthError::InvalidCallback);
        };

        let code_verifier = attempt.as_ref().map_or("", |a| a.code_verifier.as_str());
        let tokens = self.client.exchange_code(code, code_verifier).await?;

        self.install_tokens(&tokens, None).await?;
        info!("authorization code exchanged");
        self.navigator.strip_query();
        self.schedule_refresh(tokens.expires_in);
        Ok(())
    }

    /// Exchange the refresh token for a new access token and re-arm the
    /// proactive refresh. Concurrent callers collapse into one
    /// token-endpoint request: whoever holds the gate refreshes, everyone
    /// queued behind it observes the bumped epoch and returns.
    ///
    /// # Errors
    /// [`AuthError::MissingRefreshToken`] (after redirecting to login) when
    /// no refresh token is held; the exchange failure, after tearing the
    /// session down, otherwise.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let epoch = self.refresh_epoch.load(Ordering::Acquire);
        let _gate = self.refresh_gate.lock().await;
        if self.refresh_epoch.load(Ordering::Acquire) != epoch {
            debug!("refresh already completed by a concurrent caller");
            return Ok(());
        }

        let Some(refresh_token) = self.session.read().await.refresh_token.clone() else {
            warn!("refresh requested without a refresh token, starting login");
            self.begin_login().await?;
            return Err(AuthError::MissingRefreshToken);
        };

        match self.client.refresh(&refresh_token).await {
            Ok(tokens) => {
                // Providers may omit the refresh token when they do not
                // rotate it; keep the previous one in that case.
                self.install_tokens(&tokens, Some(refresh_token)).await?;
                self.refresh_epoch.fetch_add(1, Ordering::Release);
                info!("access token refreshed");
                self.schedule_refresh(tokens.expires_in);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "token refresh failed, tearing session down");
                if let Err(logout_err) = self.logout().await {
                    warn!(error = %logout_err, "logout after failed refresh also failed");
                }
                Err(err)
            }
        }
    }

    /// Fetch the user's claims from the userinfo endpoint and store the
    /// profile and derived roles.
    ///
    /// # Errors
    /// [`AuthError::NoAccessToken`] when no access token is held; the fetch
    /// failure, after tearing the session down, otherwise.
    pub async fn fetch_profile(&self) -> Result<UserProfile, AuthError> {
        let Some(access_token) = self.session.read().await.access_token.clone() else {
            return Err(AuthError::NoAccessToken);
        };

        match self.client.fetch_userinfo(&access_token).await {
            Ok(profile) => {
                let persisted = {
                    let mut session = self.session.write().await;
                    session.roles = profile.role_names();
                    session.profile = Some(profile.clone());
                    session.to_persisted()
                };
                self.store.save(&persisted).await?;
                info!(user = %profile.display_name(), "user profile loaded");
                Ok(profile)
            }
            Err(err) => {
                error!(error = %err, "profile fetch failed, tearing session down");
                if let Err(logout_err) = self.logout().await {
                    warn!(error = %logout_err, "logout after failed profile fetch also failed");
                }
                Err(err)
            }
        }
    }

    /// Tear the session down: clear state and storage, cancel the pending
    /// refresh, and leave. The exit goes to the provider's end-session
    /// endpoint when a refresh token is available to revoke, to the local
    /// login route otherwise.
    ///
    /// # Errors
    /// Returns an error when the credential store fails; the in-memory
    /// session is already cleared by then.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let refresh_token = {
            let mut session = self.session.write().await;
            let token = session.refresh_token.clone();
            session.clear();
            token
        };
        self.scheduler.cancel();
        self.store.clear().await?;
        info!("session cleared");

        match refresh_token {
            Some(token) if !self.config().dev_bypass => {
                self.navigator.redirect_external(&self.client.end_session_url(&token));
            }
            _ => self.navigator.replace_route(&self.config().login_route),
        }
        Ok(())
    }

    async fn install_tokens(
        &self,
        tokens: &TokenSet,
        fallback_refresh: Option<String>,
    ) -> Result<(), AuthError> {
        let persisted = {
            let mut session = self.session.write().await;
            session.access_token = Some(tokens.access_token.clone());
            session.refresh_token = tokens.refresh_token.clone().or(fallback_refresh);
            session.to_persisted()
        };
        self.store.save(&persisted).await
    }

    /// Arm the proactive refresh. Must stay the final await-free step on the
    /// scheduler-fired path: arming aborts the previous timer task, and that
    /// task may be the one currently running this code.
    fn schedule_refresh(&self, expires_in: i64) {
        let manager = self.clone();
        self.scheduler.arm(refresh_delay(expires_in), async move {
            if let Err(err) = manager.refresh().await {
                error!(error = %err, "scheduled token refresh failed");
            }
        });
    }

    async fn install_dev_identity(&self) -> Result<(), AuthError> {
        warn!("development bypass active, installing canned operator identity");
        let profile = dev_profile();
        let persisted = {
            let mut session = self.session.write().await;
            session.access_token = Some("dev-access-token".to_string());
            session.refresh_token = Some("dev-refresh-token".to_string());
            session.roles = profile.role_names();
            session.profile = Some(profile);
            session.to_persisted()
        };
        self.store.save(&persisted).await
    }
}

fn dev_profile() -> UserProfile {
    UserProfile {
        sub: "dev-operator".to_string(),
        preferred_username: Some("dev_user".to_string()),
        email: Some("dev@hubx.com".to_string()),
        realm_access: None,
        roles: Some(vec!["admin".to_string(), "operator".to_string()]),
        claims: serde_json::Map::new(),
    }
}
