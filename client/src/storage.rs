//! Durable credential storage.
//!
//! The session survives process restarts through whatever device-local
//! storage the host provides. The contract is get/set/clear only; the
//! serialization the session store already performs is the sole
//! concurrent-writer guarantee.

use shopsync_core::session::Session;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the durable credential store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying device storage failed.
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// The stored blob no longer parses; treated as logged out.
    #[error("Stored credentials are corrupt: {0}")]
    Corrupt(String),
}

/// Device-local persistence for the credential pair and role.
pub trait CredentialStore: Send + Sync {
    /// Loads the persisted session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the device storage fails.
    fn load(&self) -> impl Future<Output = Result<Option<Session>, StorageError>> + Send;

    /// Persists `session`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the device storage fails.
    fn save(&self, session: &Session) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removes any persisted session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the device storage fails.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// The no-op store used when persistence is not wired up.
impl CredentialStore for () {
    async fn load(&self) -> Result<Option<Session>, StorageError> {
        Ok(None)
    }

    async fn save(&self, _session: &Session) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Credential store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Session>, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Io(err.to_string())),
        };
        let session =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), StorageError> {
        let bytes =
            serde_json::to_vec(session).map_err(|e| StorageError::Io(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err.to_string())),
        }
    }
}
