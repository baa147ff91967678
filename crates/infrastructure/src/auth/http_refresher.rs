//! Refresh endpoint client.
//!
//! Posts `{"refreshToken": ...}` to the refresh endpoint and decodes
//! `{"accessToken": ..., "refreshToken"?: ...}`. Any non-2xx answer is a
//! rejection of the refresh token.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tollgate_application::TokenRefresher;
use tollgate_domain::{AuthError, RefreshedTokens};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Error body shape used by the backend (`{"message": ..., "statusCode": ...}`).
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: serde_json::Value,
}

/// Refresh-endpoint client using reqwest.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http_client: reqwest::Client,
    refresh_url: reqwest::Url,
}

impl HttpTokenRefresher {
    /// Create a refresher posting to `refresh_url`.
    #[must_use]
    pub const fn new(http_client: reqwest::Client, refresh_url: reqwest::Url) -> Self {
        Self {
            http_client,
            refresh_url,
        }
    }

    /// The endpoint this refresher posts to.
    #[must_use]
    pub const fn refresh_url(&self) -> &reqwest::Url {
        &self.refresh_url
    }

    async fn refresh_flow(&self, refresh_token: &str) -> Result<RefreshedTokens, AuthError> {
        debug!(url = %self.refresh_url, "calling refresh endpoint");
        let response = self
            .http_client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e: reqwest::Error| AuthError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &error_text));
        }

        response
            .json::<RefreshedTokens>()
            .await
            .map_err(|e: reqwest::Error| AuthError::InvalidRefreshResponse {
                message: e.to_string(),
            })
    }
}

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RefreshedTokens, AuthError>> + Send + 'a>> {
        Box::pin(self.refresh_flow(refresh_token))
    }
}

/// Builds the rejection error, preferring the backend's `message` field.
fn rejection(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|e| match e.message {
            serde_json::Value::String(s) => s,
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string());

    AuthError::RefreshRejected { status, message }
}
