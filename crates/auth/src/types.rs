//! Token, profile, and session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair with expiry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API calls.
    pub access_token: String,

    /// Refresh token; providers are not required to issue or rotate one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds, as reported by the provider.
    pub expires_in: i64,

    /// Absolute expiration timestamp, calculated when the set was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a token set, computing `expires_at` from `expires_in`.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self { access_token, refresh_token, expires_in, expires_at }
    }

    /// Seconds until the access token expires, or `None` when the provider
    /// reported no expiry.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// Token endpoint response body (RFC 6749).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self::new(response.access_token, response.refresh_token, response.expires_in)
    }
}

/// Token endpoint error body (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl std::fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {}", self.error, description),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Realm-level role container as Keycloak nests it in userinfo claims.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims returned by the userinfo endpoint.
///
/// Only the claims this console interprets are modelled; everything else the
/// provider asserts is retained opaquely in `claims`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject identifier.
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Keycloak nests realm roles here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_access: Option<RealmAccess>,

    /// Some deployments map roles to a top-level claim instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Remaining claims, passed through untouched.
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

impl UserProfile {
    /// Best available human-readable name: preferred username, then email,
    /// then the subject identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }

    /// Role names from `realm_access.roles`, falling back to the top-level
    /// `roles` claim.
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        if let Some(realm_access) = &self.realm_access {
            if !realm_access.roles.is_empty() {
                return realm_access.roles.clone();
            }
        }
        self.roles.clone().unwrap_or_default()
    }
}

/// The console's view of who is signed in.
///
/// A session is authenticated exactly when a profile is present; there is no
/// separate flag to drift out of sync.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub profile: Option<UserProfile>,
    pub roles: Vec<String>,
}

impl Session {
    /// Whether a user profile has been established.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.profile.is_some()
    }

    /// Whether the signed-in user holds the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held == role)
    }

    pub(crate) fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.profile = None;
        self.roles.clear();
    }

    pub(crate) fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user_profile: self.profile.clone(),
        }
    }
}

/// The durable mirror of the session, stored under fixed field names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
}

impl PersistedSession {
    /// A session is restored on boot only when the full triple survived.
    #[must_use]
    pub fn is_restorable(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some() && self.user_profile.is_some()
    }

    /// Whether any entry is present at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.user_profile.is_none()
    }
}
