//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for browser-redirect login without a client secret.
//! A login attempt is bound to its callback by the verifier/challenge pair
//! and a random state token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Unreserved characters permitted in a code verifier (RFC 7636 §4.1).
const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Alphanumeric characters used for the CSRF state token.
const STATE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const VERIFIER_LEN: usize = 128;
const STATE_LEN: usize = 32;

/// Generate a cryptographically random code verifier.
///
/// Returns a 128-character string drawn uniformly from the unreserved set
/// (the maximum length RFC 7636 allows, for maximum entropy).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_string(VERIFIER_CHARSET, VERIFIER_LEN)
}

/// Compute the S256 code challenge for a verifier.
///
/// `challenge = BASE64URL(SHA256(ASCII(verifier)))`, without padding.
/// Deterministic for a given verifier.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token for CSRF protection.
///
/// Returns a 32-character alphanumeric string binding a login attempt to
/// its callback.
#[must_use]
pub fn generate_state() -> String {
    random_string(STATE_CHARSET, STATE_LEN)
}

/// Check whether the state received in a callback matches the stored one.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    expected == actual
}

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| charset[rng.gen_range(0..charset.len())] as char).collect()
}

/// One login attempt's PKCE material.
///
/// Created when the login redirect starts and consumed by the matching
/// callback. Serializable so it can be parked in the credential store for
/// the duration of the external redirect, which does not preserve process
/// memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkceAttempt {
    /// Random secret, revealed only during token exchange.
    pub code_verifier: String,

    /// SHA-256 hash of the verifier, sent in the authorization request.
    pub code_challenge: String,

    /// CSRF token; must round-trip through the callback unchanged.
    pub state: String,
}

impl PkceAttempt {
    /// Generate a fresh attempt with random verifier and state.
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state();

        Self { code_verifier, code_challenge, state }
    }

    /// The challenge method sent to the provider (always `S256`).
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}
