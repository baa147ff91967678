//! Application error types

use thiserror::Error;
use tollgate_domain::{AuthError, DomainError};

use crate::ports::HttpClientError;

/// Errors surfaced by the authenticated gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request failed validation before it was sent.
    #[error("invalid request: {0}")]
    Invalid(#[from] DomainError),

    /// The HTTP call itself failed.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpClientError),

    /// The token refresh failed; the session is gone.
    #[error("token refresh failed: {0}")]
    Refresh(#[from] AuthError),

    /// An auth endpoint (login, register, refresh, logout) answered 401.
    #[error("authentication rejected by {path}")]
    AuthEndpointRejected {
        /// The auth endpoint path.
        path: String,
    },

    /// The request was still rejected after its single replay.
    #[error("unauthorized: {path}")]
    Unauthorized {
        /// The request path.
        path: String,
    },

    /// A 401 arrived while a logout was in progress.
    #[error("logout in progress")]
    LoggingOut,

    /// The server answered with a non-success status.
    #[error("request to {path} failed with status {status}")]
    Status {
        /// The request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl GatewayError {
    /// Returns true if the caller should send the user back to sign-in.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        match self {
            Self::Refresh(error) => error.is_session_fatal(),
            Self::Unauthorized { .. } | Self::AuthEndpointRejected { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_sign_in() {
        assert!(
            GatewayError::Refresh(AuthError::RefreshRejected {
                status: 400,
                message: "invalid refresh token".to_string(),
            })
            .requires_sign_in()
        );
        assert!(
            GatewayError::Unauthorized {
                path: "/orders".to_string()
            }
            .requires_sign_in()
        );
        assert!(!GatewayError::Refresh(AuthError::Cancelled).requires_sign_in());
        assert!(!GatewayError::LoggingOut.requires_sign_in());
        assert!(
            !GatewayError::Http(HttpClientError::Timeout { timeout_ms: 30_000 }).requires_sign_in()
        );
    }
}
