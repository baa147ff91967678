//! Gateway wiring.
//!
//! Assembles an [`AuthGateway`] from [`ClientSettings`]: one reqwest client
//! shared by the request adapter and the refresh adapter, a token store
//! (file backed when `session_dir` is set), and a refresh coordinator.

use std::sync::Arc;

use tollgate_application::{
    AuthGateway, HttpClientError, RefreshCoordinator, SessionEvents, TokenStore,
};
use tollgate_domain::{ClientSettings, DomainError};
use tracing::debug;

use crate::adapters::ReqwestHttpClient;
use crate::auth::HttpTokenRefresher;
use crate::persistence::FileTokenRepository;

/// Error type for gateway construction.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The settings are invalid.
    #[error("invalid settings: {0}")]
    Settings(#[from] DomainError),

    /// The HTTP client could not be created.
    #[error("http client: {0}")]
    Http(#[from] HttpClientError),
}

/// Build a gateway for the backend described by `settings`.
///
/// The returned gateway starts without a session; call
/// [`AuthGateway::restore_session`] or [`AuthGateway::login`] next.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the HTTP client cannot be
/// created.
pub fn build_gateway(settings: &ClientSettings) -> Result<AuthGateway, ClientBuildError> {
    settings.validate()?;

    let http = ReqwestHttpClient::from_settings(settings)?;
    let refresh_url = http.resolve(&settings.endpoints.refresh, &[])?;
    let refresher = HttpTokenRefresher::new(http.inner().clone(), refresh_url);

    let store = match &settings.session_dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "session persistence enabled");
            TokenStore::with_persistence(Arc::new(FileTokenRepository::new(dir.clone())))
        }
        None => TokenStore::new(),
    };

    let coordinator = RefreshCoordinator::new(store, Arc::new(refresher), SessionEvents::default())
        .with_refresh_timeout(settings.refresh_timeout());

    Ok(AuthGateway::new(
        Arc::new(http),
        Arc::new(coordinator),
        settings.endpoints.clone(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_gateway_with_defaults() {
        let gateway = build_gateway(&ClientSettings::default()).unwrap();
        assert!(gateway.store().access_token().is_none());
        assert!(!gateway.coordinator().is_refreshing());
    }

    #[test]
    fn test_build_gateway_rejects_invalid_settings() {
        let settings = ClientSettings {
            base_url: "ftp://shop.example.com".to_string(),
            ..ClientSettings::default()
        };
        assert!(matches!(
            build_gateway(&settings),
            Err(ClientBuildError::Settings(_))
        ));
    }

    #[test]
    fn test_refresh_url_shares_base_prefix() {
        let settings = ClientSettings {
            base_url: "https://shop.example.com/api".to_string(),
            ..ClientSettings::default()
        };
        let http = ReqwestHttpClient::from_settings(&settings).unwrap();
        let url = http.resolve(&settings.endpoints.refresh, &[]).unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/api/auth/refresh");
    }
}
