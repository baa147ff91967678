//! File-based session repository.
//!
//! The session is stored in `session.json` inside the configured directory:
//! ```json
//! {
//!   "accessToken": "eyJhbGciOi...",
//!   "refreshToken": "eyJhbGciOi...",
//!   "obtainedAt": "2026-10-16T09:30:00Z"
//! }
//! ```
//! Writes go to a temporary file that is created owner-only (0600 on unix)
//! and renamed into place, so a crash never leaves a half-written session
//! behind and the tokens are never readable by other users.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tollgate_application::{PersistenceError, TokenPersistence};
use tollgate_domain::SessionTokens;
use tracing::debug;

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const SESSION_FILE: &str = "session.json";

/// Session repository backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileTokenRepository {
    dir: PathBuf,
}

impl FileTokenRepository {
    /// Creates a repository storing the session under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Platform data directory for Tollgate, e.g. `~/.local/share/tollgate`.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("tollgate"))
    }

    /// Path of the session file.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{SESSION_FILE}.tmp"))
    }
}

#[async_trait]
impl TokenPersistence for FileTokenRepository {
    async fn load(&self) -> Result<Option<SessionTokens>, PersistenceError> {
        let path = self.session_path();
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let tokens =
            from_json_bytes(&content).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        Ok(Some(tokens))
    }

    async fn save(&self, tokens: &SessionTokens) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).await?;

        let content =
            to_json_stable_bytes(tokens).map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        let temp = self.temp_path();
        write_private(&temp, &content).await?;
        fs::rename(&temp, self.session_path()).await?;
        debug!(path = %self.session_path().display(), "session saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(self.session_path()).await {
            Ok(()) => {
                debug!("session file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes `content` to a freshly created owner-only file.
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // A leftover file would keep its old mode, so start from scratch.
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}
