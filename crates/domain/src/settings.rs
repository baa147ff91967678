//! Client settings
//!
//! Everything the client needs to talk to the backend. Loaded by the
//! infrastructure layer from defaults, an optional file and the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::AuthEndpoints;
use crate::error::{DomainError, DomainResult};

/// Settings for the authenticated API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the REST backend, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Timeout applied to every ordinary request.
    pub request_timeout_ms: u64,
    /// Upper bound on a refresh call; bounds how long queued requests wait.
    pub refresh_timeout_ms: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Auth endpoint paths.
    pub endpoints: AuthEndpoints,
    /// Directory holding the persisted session. `None` keeps the session
    /// in memory only.
    pub session_dir: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_ms: 30_000,
            refresh_timeout_ms: 10_000,
            user_agent: concat!("tollgate/", env!("CARGO_PKG_VERSION")).to_string(),
            endpoints: AuthEndpoints::default(),
            session_dir: None,
        }
    }
}

impl ClientSettings {
    /// Timeout for ordinary requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Timeout for the refresh call.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse as http(s), a timeout
    /// is zero, or an endpoint path is not absolute.
    pub fn validate(&self) -> DomainResult<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| DomainError::InvalidUrl(format!("{e}: {}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::InvalidUrl(self.base_url.clone()));
        }
        if self.request_timeout_ms == 0 {
            return Err(DomainError::InvalidSetting {
                name: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_timeout_ms == 0 {
            return Err(DomainError::InvalidSetting {
                name: "refresh_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        let endpoints = &self.endpoints;
        for (name, path) in [
            ("endpoints.login", &endpoints.login),
            ("endpoints.register", &endpoints.register),
            ("endpoints.refresh", &endpoints.refresh),
            ("endpoints.logout", &endpoints.logout),
        ] {
            if !path.starts_with('/') {
                return Err(DomainError::InvalidSetting {
                    name,
                    reason: format!("`{path}` must start with '/'"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ClientSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.refresh_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let settings = ClientSettings {
            base_url: "ftp://example.com".to_string(),
            ..ClientSettings::default()
        };
        assert!(matches!(settings.validate(), Err(DomainError::InvalidUrl(_))));
    }

    #[test]
    fn test_rejects_zero_refresh_timeout() {
        let settings = ClientSettings {
            refresh_timeout_ms: 0,
            ..ClientSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(DomainError::InvalidSetting {
                name: "refresh_timeout_ms",
                reason: "must be greater than zero".to_string(),
            })
        );
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"base_url":"https://shop.example.com/api"}"#).unwrap();
        assert_eq!(settings.base_url, "https://shop.example.com/api");
        assert_eq!(settings.endpoints, AuthEndpoints::default());
    }
}
