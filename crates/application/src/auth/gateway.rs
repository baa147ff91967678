//! Authenticated request gateway.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tollgate_domain::{
    AuthEndpoints, AuthError, Credentials, HttpMethod, RequestSpec, ResponseSpec, SessionTokens,
};
use tracing::{debug, info, warn};

use super::coordinator::RefreshCoordinator;
use super::events::SessionEvent;
use super::token_store::TokenStore;
use crate::error::{GatewayError, GatewayResult};
use crate::ports::{HttpClient, PersistenceError};

/// Sends requests with the session's bearer token and recovers from
/// expired tokens.
///
/// A `401` on an ordinary endpoint is handed to the [`RefreshCoordinator`]
/// and the request is replayed once with the new token. A `401` on an auth
/// endpoint, on an already replayed request, or during logout is returned
/// to the caller as an error.
#[derive(Clone)]
pub struct AuthGateway {
    client: Arc<dyn HttpClient>,
    coordinator: Arc<RefreshCoordinator>,
    endpoints: AuthEndpoints,
}

impl AuthGateway {
    /// Create a gateway sending through `client` for the session owned by
    /// `coordinator`.
    #[must_use]
    pub fn new(
        client: Arc<dyn HttpClient>,
        coordinator: Arc<RefreshCoordinator>,
        endpoints: AuthEndpoints,
    ) -> Self {
        Self {
            client,
            coordinator,
            endpoints,
        }
    }

    /// The session's token store.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        self.coordinator.store()
    }

    /// The refresh coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send a request with the current bearer token.
    ///
    /// Any status other than `401` is returned as a response; callers check
    /// it themselves or use [`send_json`](Self::send_json).
    ///
    /// # Errors
    ///
    /// See [`GatewayError`]; a failed refresh surfaces as
    /// [`GatewayError::Refresh`].
    pub async fn send(&self, mut request: RequestSpec) -> GatewayResult<ResponseSpec> {
        request.validate()?;

        let sent_with = self.store().access_token();
        request.authorize(sent_with.as_deref());
        debug!(id = %request.id, method = %request.method, path = %request.path, "sending request");

        let response = self.client.execute(&request).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        if self.endpoints.is_auth_endpoint(&request.path) {
            debug!(path = %request.path, "auth endpoint rejected credentials");
            return Err(GatewayError::AuthEndpointRejected { path: request.path });
        }
        if request.retried {
            return Err(GatewayError::Unauthorized { path: request.path });
        }
        if self.store().is_logging_out() {
            return Err(GatewayError::LoggingOut);
        }

        request.retried = true;
        debug!(id = %request.id, "access token rejected, refreshing");
        let token = self
            .coordinator
            .refresh(sent_with.as_deref())
            .await
            .map_err(|e| match e {
                AuthError::LoggingOut => GatewayError::LoggingOut,
                other => GatewayError::Refresh(other),
            })?;

        request.authorize(Some(&token));
        debug!(id = %request.id, "replaying request with refreshed token");
        let response = self.client.execute(&request).await?;
        if response.is_unauthorized() {
            return Err(GatewayError::Unauthorized { path: request.path });
        }
        Ok(response)
    }

    /// Send a request and decode a successful JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Status`] for a non-2xx answer and
    /// [`GatewayError::InvalidPayload`] if the body does not decode.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestSpec) -> GatewayResult<T> {
        let path = request.path.clone();
        let response = self.send(request).await?;
        decode(&path, &response)
    }

    /// GET `path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn get(&self, path: &str) -> GatewayResult<ResponseSpec> {
        self.send(RequestSpec::get(path)).await
    }

    /// POST a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<ResponseSpec> {
        self.send(json_request(HttpMethod::Post, path, body)?).await
    }

    /// PUT a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<ResponseSpec> {
        self.send(json_request(HttpMethod::Put, path, body)?).await
    }

    /// PATCH a JSON body to `path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn patch_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<ResponseSpec> {
        self.send(json_request(HttpMethod::Patch, path, body)?).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn delete(&self, path: &str) -> GatewayResult<ResponseSpec> {
        self.send(RequestSpec::delete(path)).await
    }

    /// Log in and store the returned session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AuthEndpointRejected`] for bad credentials and
    /// [`GatewayError::Status`] for any other non-2xx answer.
    pub async fn login(&self, credentials: &Credentials) -> GatewayResult<SessionTokens> {
        let path = self.endpoints.login.clone();
        self.establish_session(&path, credentials).await
    }

    /// Register an account and store the returned session.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn register<B: Serialize + ?Sized>(&self, payload: &B) -> GatewayResult<SessionTokens> {
        let path = self.endpoints.register.clone();
        self.establish_session(&path, payload).await
    }

    /// Log out.
    ///
    /// While the logout runs no refresh is started and any `401` fails
    /// fast. The logout endpoint is called best effort; the local session
    /// is cleared whatever it answers.
    pub async fn logout(&self) {
        let store = self.store();
        if !store.begin_logout() {
            debug!("logout already in progress");
            return;
        }
        let _reset = LogoutReset { store };

        if store.access_token().is_some() {
            let request = RequestSpec::new(HttpMethod::Post, self.endpoints.logout.clone());
            match self.send(request).await {
                Ok(response) if !response.is_success() => {
                    warn!(status = response.status, "logout endpoint answered with an error");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "logout call failed"),
            }
        }

        store.clear().await;
        info!("logged out");
        self.coordinator.events().emit(SessionEvent::LoggedOut);
    }

    /// Load a persisted session into the store.
    ///
    /// Returns true if a session was restored.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted session cannot be read.
    pub async fn restore_session(&self) -> Result<bool, PersistenceError> {
        let restored = self.store().restore().await?;
        if restored {
            info!("session restored from storage");
        }
        Ok(restored)
    }

    async fn establish_session<B: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &B,
    ) -> GatewayResult<SessionTokens> {
        let request = json_request(HttpMethod::Post, path, payload)?;
        let tokens: SessionTokens = self.send_json(request).await?;

        self.store().set(tokens.clone()).await;
        info!(path, "session established");
        self.coordinator
            .events()
            .emit(SessionEvent::logged_in(&tokens.access_token));
        Ok(tokens)
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("coordinator", &self.coordinator)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Clears the logging-out flag when the logout finishes or is dropped.
struct LogoutReset<'a> {
    store: &'a TokenStore,
}

impl Drop for LogoutReset<'_> {
    fn drop(&mut self) {
        self.store.end_logout();
    }
}

fn json_request<B: Serialize + ?Sized>(
    method: HttpMethod,
    path: &str,
    body: &B,
) -> GatewayResult<RequestSpec> {
    let value =
        serde_json::to_value(body).map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
    Ok(RequestSpec::json(method, path, value))
}

fn decode<T: DeserializeOwned>(path: &str, response: &ResponseSpec) -> GatewayResult<T> {
    if !response.is_success() {
        return Err(GatewayError::Status {
            path: path.to_string(),
            status: response.status,
            body: response.text(),
        });
    }
    response
        .json_body()
        .map_err(|e| GatewayError::InvalidPayload(format!("{path}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_request() {
        let request = json_request(HttpMethod::Post, "/cart/items", &json!({"sku": "A1"})).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body.content_type(), Some("application/json"));
    }

    #[test]
    fn test_decode_rejects_non_success() {
        let response = ResponseSpec::json(404, &json!({"message": "Product not found"}));
        let result: GatewayResult<serde_json::Value> = decode("/products/9", &response);
        assert!(matches!(result, Err(GatewayError::Status { status: 404, .. })));
    }

    #[test]
    fn test_decode_reports_bad_payload() {
        let response = ResponseSpec::json(200, &json!({"unexpected": true}));
        let result: GatewayResult<SessionTokens> = decode("/auth/login", &response);
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }
}
