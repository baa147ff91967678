//! Token refresh port

use std::future::Future;
use std::pin::Pin;

use tollgate_domain::{AuthError, RefreshedTokens};

/// Port for the refresh endpoint.
///
/// Exactly one call is made per refresh cycle; the
/// [`RefreshCoordinator`](crate::RefreshCoordinator) owns retries, queueing
/// and the timeout.
pub trait TokenRefresher: Send + Sync {
    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshRejected`] for a non-2xx answer,
    /// [`AuthError::Network`] if the endpoint is unreachable and
    /// [`AuthError::InvalidRefreshResponse`] for an unusable payload.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RefreshedTokens, AuthError>> + Send + 'a>>;
}
