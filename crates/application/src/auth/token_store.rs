//! Session token storage.
//!
//! The store is the single owner of the access/refresh pair and of the
//! logging-out flag. Reads are synchronous so the refresh coordinator can
//! inspect the current token while it holds its own state lock; the lock is
//! never held across an await point. Persistence, when configured, always
//! writes a snapshot of the in-memory state so concurrent writers cannot
//! leave a stale session on disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::Mutex;
use tollgate_domain::{RefreshedTokens, SessionTokens, token_preview};
use tracing::{debug, warn};

use crate::ports::{PersistenceError, TokenPersistence};

/// Thread-safe session token store.
#[derive(Clone)]
pub struct TokenStore {
    tokens: Arc<RwLock<Option<SessionTokens>>>,
    logging_out: Arc<AtomicBool>,
    persistence: Option<Arc<dyn TokenPersistence>>,
    persist_lock: Arc<Mutex<()>>,
}

impl TokenStore {
    /// Create an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(None)),
            logging_out: Arc::new(AtomicBool::new(false)),
            persistence: None,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create a store that mirrors every change to `persistence`.
    #[must_use]
    pub fn with_persistence(persistence: Arc<dyn TokenPersistence>) -> Self {
        Self {
            persistence: Some(persistence),
            ..Self::new()
        }
    }

    /// Load the persisted session into memory.
    ///
    /// Returns true if a session was restored. An in-memory session that
    /// already exists is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted session cannot be read.
    pub async fn restore(&self) -> Result<bool, PersistenceError> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let Some(tokens) = persistence.load().await? else {
            return Ok(false);
        };

        let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(false);
        }
        debug!(token = %token_preview(&tokens.access_token), "session restored");
        *guard = Some(tokens);
        Ok(true)
    }

    /// Replace the session, e.g. after login.
    pub async fn set(&self, tokens: SessionTokens) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens);
        self.sync_persistence().await;
    }

    /// Apply a refresh result to the current session.
    ///
    /// Returns the updated session, or `None` if the session was cleared
    /// while the refresh was in flight; a cleared session is never revived.
    pub async fn apply_refresh(&self, refreshed: RefreshedTokens) -> Option<SessionTokens> {
        let updated = {
            let mut guard = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
            let current = guard.take()?;
            let updated = current.refreshed(refreshed);
            *guard = Some(updated.clone());
            updated
        };
        self.sync_persistence().await;
        Some(updated)
    }

    /// Returns a copy of the current session.
    #[must_use]
    pub fn get(&self) -> Option<SessionTokens> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Returns the current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }

    /// Drop the session from memory and persistence.
    pub async fn clear(&self) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.sync_persistence().await;
    }

    /// Mark a logout as in progress. Returns false if one already was.
    pub fn begin_logout(&self) -> bool {
        !self.logging_out.swap(true, Ordering::SeqCst)
    }

    /// Mark the logout as finished.
    pub fn end_logout(&self) {
        self.logging_out.store(false, Ordering::SeqCst);
    }

    /// Returns true while a logout is in progress.
    #[must_use]
    pub fn is_logging_out(&self) -> bool {
        self.logging_out.load(Ordering::SeqCst)
    }

    /// Get session status for display.
    #[must_use]
    pub fn status(&self) -> TokenStatus {
        if self.is_logging_out() {
            return TokenStatus::LoggingOut;
        }
        self.get()
            .map_or(TokenStatus::NotAuthenticated, |tokens| TokenStatus::Authenticated {
                access_preview: token_preview(&tokens.access_token),
                seconds_since_issue: (Utc::now() - tokens.obtained_at).num_seconds(),
            })
    }

    async fn sync_persistence(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.get();
        let result = match &snapshot {
            Some(tokens) => persistence.save(tokens).await,
            None => persistence.clear().await,
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist session");
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("status", &self.status())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

/// Status of the session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// No session is held.
    NotAuthenticated,
    /// A session is held.
    Authenticated {
        /// Preview of the access token.
        access_preview: String,
        /// Seconds since the access token was issued.
        seconds_since_issue: i64,
    },
    /// A logout is in progress.
    LoggingOut,
}

impl TokenStatus {
    /// Returns true if a session is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not authenticated".to_string(),
            Self::LoggingOut => "Logging out".to_string(),
            Self::Authenticated {
                access_preview,
                seconds_since_issue,
            } => {
                let secs = *seconds_since_issue;
                let age = if secs > 3600 {
                    format!("{} hours", secs / 3600)
                } else if secs > 60 {
                    format!("{} minutes", secs / 60)
                } else {
                    format!("{secs} seconds")
                };
                format!("Authenticated as {access_preview} (issued {age} ago)")
            }
        }
    }
}
