//! Durable credential storage
//!
//! The store mirrors the session triple (access token, refresh token,
//! serialized profile) under fixed names, and parks the PKCE attempt for the
//! duration of the login redirect. The session manager is the only writer;
//! the store is read once at boot and on callback handling.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use crate::pkce::PkceAttempt;
use crate::types::PersistedSession;

/// Storage seam for persisted credentials and the in-flight login attempt.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the persisted session, `None` when nothing is stored.
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError>;

    /// Write the persisted session, replacing any previous value.
    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError>;

    /// Erase the persisted session. The parked login attempt survives; it
    /// has its own single-use lifecycle.
    async fn clear(&self) -> Result<(), AuthError>;

    /// Park a login attempt for the duration of the external redirect.
    async fn save_attempt(&self, attempt: &PkceAttempt) -> Result<(), AuthError>;

    /// Consume the parked login attempt, if any. A second call returns
    /// `None`; an attempt is valid for exactly one callback.
    async fn take_attempt(&self) -> Result<Option<PkceAttempt>, AuthError>;
}

#[derive(Default)]
struct MemoryState {
    session: Option<PersistedSession>,
    attempt: Option<PkceAttempt>,
}

/// In-memory store for tests and short-lived embeddings.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        Ok(self.state.lock().session.clone())
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        self.state.lock().session = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        self.state.lock().session = None;
        Ok(())
    }

    async fn save_attempt(&self, attempt: &PkceAttempt) -> Result<(), AuthError> {
        self.state.lock().attempt = Some(attempt.clone());
        Ok(())
    }

    async fn take_attempt(&self) -> Result<Option<PkceAttempt>, AuthError> {
        Ok(self.state.lock().attempt.take())
    }
}

/// On-disk JSON document: the session triple plus the parked attempt.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(flatten)]
    session: PersistedSession,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    login_attempt: Option<PkceAttempt>,
}

/// File-backed store: a single JSON document, written atomically.
///
/// The native counterpart of the browser's per-origin local storage. Writes
/// go to a sibling temp file first and are moved into place, so a crash
/// mid-write never leaves a truncated document.
#[derive(Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given path. The file and its parent
    /// directory are created lazily on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_document(&self) -> Result<Option<StoreDocument>, AuthError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let document = serde_json::from_str(&raw)
                    .map_err(|err| AuthError::Storage(format!("corrupt credential file: {err}")))?;
                Ok(Some(document))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AuthError::Storage(err.to_string())),
        }
    }

    async fn write_document(&self, document: &StoreDocument) -> Result<(), AuthError> {
        if document.session.is_empty() && document.login_attempt.is_none() {
            return self.remove_file().await;
        }

        let serialized = serde_json::to_string_pretty(document)
            .map_err(|err| AuthError::Storage(err.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| AuthError::Storage(err.to_string()))?;
            }
        }

        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, serialized)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| AuthError::Storage(err.to_string()))?;

        debug!(path = %self.path.display(), "credential file written");
        Ok(())
    }

    async fn remove_file(&self) -> Result<(), AuthError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Storage(err.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<PersistedSession>, AuthError> {
        let Some(document) = self.read_document().await? else {
            return Ok(None);
        };
        if document.session.is_empty() {
            return Ok(None);
        }
        Ok(Some(document.session))
    }

    async fn save(&self, session: &PersistedSession) -> Result<(), AuthError> {
        let mut document = self.read_document().await?.unwrap_or_default();
        document.session = session.clone();
        self.write_document(&document).await
    }

    async fn clear(&self) -> Result<(), AuthError> {
        let Some(mut document) = self.read_document().await? else {
            return Ok(());
        };
        document.session = PersistedSession::default();
        self.write_document(&document).await
    }

    async fn save_attempt(&self, attempt: &PkceAttempt) -> Result<(), AuthError> {
        let mut document = self.read_document().await?.unwrap_or_default();
        document.login_attempt = Some(attempt.clone());
        self.write_document(&document).await
    }

    async fn take_attempt(&self) -> Result<Option<PkceAttempt>, AuthError> {
        let Some(mut document) = self.read_document().await? else {
            return Ok(None);
        };
        let attempt = document.login_attempt.take();
        if attempt.is_some() {
            self.write_document(&document).await?;
        }
        Ok(attempt)
    }
}
