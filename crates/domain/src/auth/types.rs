//! Session token types and the authentication error taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh token pair for an authenticated session.
///
/// Serialized as `{"accessToken": ..., "refreshToken": ...}`, the shape
/// returned by the login and register endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    /// Short-lived credential authorizing API requests.
    pub access_token: String,
    /// Longer-lived credential used solely to mint a new access token.
    pub refresh_token: String,
    /// When this pair was obtained or last refreshed.
    #[serde(default = "Utc::now")]
    pub obtained_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Create a token pair stamped with the current time.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            obtained_at: Utc::now(),
        }
    }

    /// Apply a refresh result, keeping the current refresh token when the
    /// server did not rotate it.
    #[must_use]
    pub fn refreshed(self, refreshed: RefreshedTokens) -> Self {
        Self {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.unwrap_or(self.refresh_token),
            obtained_at: Utc::now(),
        }
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        bearer(&self.access_token)
    }
}

/// Successful payload of the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    /// Newly minted access token.
    pub access_token: String,
    /// Rotated refresh token, if the server issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates login credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Authentication errors.
///
/// `Clone` because a single refresh failure is delivered to every request
/// queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No refresh token is held, so no refresh can be attempted.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected with status {status}: {message}")]
    RefreshRejected {
        /// HTTP status returned by the refresh endpoint.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// The refresh endpoint answered 2xx with an unusable payload.
    #[error("invalid refresh response: {message}")]
    InvalidRefreshResponse {
        /// Decoding error.
        message: String,
    },

    /// The refresh call could not reach the server.
    #[error("network error during refresh: {message}")]
    Network {
        /// Transport error description.
        message: String,
    },

    /// The refresh call did not settle within the configured bound.
    #[error("refresh timed out after {timeout_ms}ms")]
    Timeout {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// A logout is in progress; refreshing is suppressed.
    #[error("logout in progress")]
    LoggingOut,

    /// The task driving the refresh was dropped before it settled.
    #[error("refresh cancelled")]
    Cancelled,
}

impl AuthError {
    /// Returns true if this failure ends the session.
    ///
    /// Every refresh failure does, including network errors and timeouts.
    /// A refresh abandoned for a logout or dropped before it settled leaves
    /// the session to whoever abandoned it.
    #[must_use]
    pub const fn is_session_fatal(&self) -> bool {
        !matches!(self, Self::LoggingOut | Self::Cancelled)
    }
}

/// Formats a bearer `Authorization` header value.
#[must_use]
pub fn bearer(access_token: &str) -> String {
    format!("Bearer {access_token}")
}

/// Get a preview of a token (first 8 chars + ...), safe for logs.
#[must_use]
pub fn token_preview(token: &str) -> String {
    match token.char_indices().nth(8) {
        Some((idx, _)) if token.len() > 12 => format!("{}...", &token[..idx]),
        _ => token.to_string(),
    }
}
