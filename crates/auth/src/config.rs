//! Keycloak realm configuration
//!
//! Endpoint layout follows the Keycloak OpenID Connect convention:
//! `{base_url}/realms/{realm}/protocol/openid-connect/{leaf}`.

use crate::error::AuthError;

/// Configuration for the Keycloak realm this console authenticates against.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Keycloak base URL (e.g. `https://id.example.com/auth`).
    pub base_url: String,

    /// Realm name.
    pub realm: String,

    /// OAuth client ID registered for this console.
    pub client_id: String,

    /// Redirect URI; must match the Keycloak client registration exactly.
    pub redirect_uri: String,

    /// Requested scopes (default: `openid profile email`).
    pub scopes: Vec<String>,

    /// Where the browser lands after an end-session redirect.
    /// Defaults to the origin of `redirect_uri`.
    pub post_logout_uri: String,

    /// Local route for the login entry point.
    pub login_route: String,

    /// Local route for the application root.
    pub root_route: String,

    /// Reject a callback whose state does not match the stored attempt.
    ///
    /// Off by default: a page refresh on the callback route loses nothing
    /// but the stored attempt, and rejecting there would bounce users back
    /// through the provider. Enable for deployments that prefer the hard
    /// CSRF guarantee.
    pub strict_state_validation: bool,

    /// Development bypass: authenticate with a canned operator identity and
    /// no identity-provider traffic.
    pub dev_bypass: bool,
}

impl KeycloakConfig {
    /// Create a configuration for a realm.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let redirect_uri = redirect_uri.into();
        let post_logout_uri = origin_of(&redirect_uri);

        Self {
            base_url: base_url.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            redirect_uri,
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            post_logout_uri,
            login_route: "/login".into(),
            root_route: "/".into(),
            strict_state_validation: false,
            dev_bypass: false,
        }
    }

    /// Override the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the post-logout redirect target.
    #[must_use]
    pub fn with_post_logout_uri(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_uri = uri.into();
        self
    }

    /// Enable or disable strict callback state validation.
    #[must_use]
    pub fn with_strict_state_validation(mut self, strict: bool) -> Self {
        self.strict_state_validation = strict;
        self
    }

    /// Enable the development authentication bypass.
    #[must_use]
    pub fn with_dev_bypass(mut self, bypass: bool) -> Self {
        self.dev_bypass = bypass;
        self
    }

    /// Load configuration from `HUBX_AUTH_*` environment variables.
    ///
    /// Required: `HUBX_AUTH_SERVER_URL`, `HUBX_AUTH_REALM`,
    /// `HUBX_AUTH_CLIENT_ID`, `HUBX_AUTH_REDIRECT_URI`.
    /// Optional: `HUBX_AUTH_SCOPES` (space-separated) and
    /// `HUBX_AUTH_DEV_BYPASS`.
    ///
    /// # Errors
    /// Returns [`AuthError::Config`] when a required variable is missing.
    pub fn from_env() -> Result<Self, AuthError> {
        let mut config = Self::new(
            require_env("HUBX_AUTH_SERVER_URL")?,
            require_env("HUBX_AUTH_REALM")?,
            require_env("HUBX_AUTH_CLIENT_ID")?,
            require_env("HUBX_AUTH_REDIRECT_URI")?,
        );

        if let Ok(scopes) = std::env::var("HUBX_AUTH_SCOPES") {
            config.scopes = scopes.split_whitespace().map(ToOwned::to_owned).collect();
        }

        if std::env::var_os("HUBX_AUTH_DEV_BYPASS").is_some() {
            config.dev_bypass = true;
        }

        Ok(config)
    }

    /// Authorization endpoint (browser navigation target).
    #[must_use]
    pub fn authorization_url(&self) -> String {
        self.realm_endpoint("auth")
    }

    /// Token endpoint (code exchange and refresh).
    #[must_use]
    pub fn token_url(&self) -> String {
        self.realm_endpoint("token")
    }

    /// Userinfo endpoint.
    #[must_use]
    pub fn userinfo_url(&self) -> String {
        self.realm_endpoint("userinfo")
    }

    /// End-session endpoint (browser navigation target).
    #[must_use]
    pub fn end_session_url(&self) -> String {
        self.realm_endpoint("logout")
    }

    /// Scopes as the space-separated string the provider expects.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    fn realm_endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{}",
            self.base_url.trim_end_matches('/'),
            self.realm,
            leaf
        )
    }
}

/// Read a required environment variable, mapping absence to a
/// [`AuthError::Config`] naming the missing variable.
fn require_env(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is required")))
}

/// Scheme + authority of a URI, falling back to the full URI when it does
/// not parse as an absolute URL.
fn origin_of(uri: &str) -> String {
    match url::Url::parse(uri) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => uri.to_string(),
    }
}
