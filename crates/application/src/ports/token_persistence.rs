//! Token persistence port
//!
//! Durable storage for the session so it survives a restart.

use async_trait::async_trait;
use tollgate_domain::SessionTokens;

/// Errors that can occur during token persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Repository trait for session persistence.
#[async_trait]
pub trait TokenPersistence: Send + Sync {
    /// Loads the persisted session, or `None` if nothing is stored.
    async fn load(&self) -> Result<Option<SessionTokens>, PersistenceError>;

    /// Persists the session, replacing any previous one.
    async fn save(&self, tokens: &SessionTokens) -> Result<(), PersistenceError>;

    /// Removes the persisted session. Succeeds if nothing is stored.
    async fn clear(&self) -> Result<(), PersistenceError>;
}
