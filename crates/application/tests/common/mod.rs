//! In-memory fakes for the HTTP and refresh ports.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::Notify;
use tollgate_application::{
    AuthGateway, HttpClient, HttpClientError, RefreshCoordinator, SessionEvents, TokenRefresher,
    TokenStore,
};
use tollgate_domain::{
    AuthEndpoints, AuthError, RefreshedTokens, RequestSpec, ResponseSpec, SessionTokens,
};

/// A request as the fake server saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub path: String,
    pub bearer: Option<String>,
}

/// Fake backend: accepts exactly one access token, answers 401 otherwise.
#[derive(Default)]
pub struct FakeApi {
    valid_token: Mutex<Option<String>>,
    seen: Mutex<Vec<Seen>>,
}

impl FakeApi {
    pub fn accepting(token: &str) -> Arc<Self> {
        let api = Arc::new(Self::default());
        api.accept(token);
        api
    }

    pub fn accept(&self, token: &str) {
        *self.valid_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn reject_everything(&self) {
        self.valid_token.lock().unwrap().take();
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_on(&self, path: &str) -> Vec<Seen> {
        self.seen().into_iter().filter(|s| s.path == path).collect()
    }

    fn respond(&self, request: &RequestSpec) -> ResponseSpec {
        let bearer = request.bearer_token().map(String::from);
        self.seen.lock().unwrap().push(Seen {
            path: request.path.clone(),
            bearer: bearer.clone(),
        });

        match request.path.as_str() {
            "/auth/login" => {
                let body: serde_json::Value = match &request.body {
                    tollgate_domain::RequestBody::Json { value } => value.clone(),
                    _ => json!({}),
                };
                if body["password"] == "secret" {
                    self.accept("T1");
                    ResponseSpec::json(200, &json!({"accessToken": "T1", "refreshToken": "R1"}))
                } else {
                    ResponseSpec::json(401, &json!({"message": "Invalid credentials"}))
                }
            }
            "/auth/logout" => ResponseSpec::empty(204),
            "/auth/refresh" => ResponseSpec::json(401, &json!({"message": "Unauthorized"})),
            path => {
                let valid = self.valid_token.lock().unwrap().clone();
                if bearer.is_some() && bearer == valid {
                    ResponseSpec::json(200, &json!({"path": path}))
                } else {
                    ResponseSpec::json(401, &json!({"message": "Unauthorized"}))
                }
            }
        }
    }
}

impl HttpClient for FakeApi {
    fn execute<'a>(
        &'a self,
        request: &'a RequestSpec,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseSpec, HttpClientError>> + Send + 'a>> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(self.respond(request))
        })
    }
}

/// Refresher that counts calls and holds each one until released.
pub struct FakeRefresher {
    api: Arc<FakeApi>,
    result: Result<RefreshedTokens, AuthError>,
    calls: AtomicUsize,
    gate: Option<Notify>,
    rotate: bool,
}

impl FakeRefresher {
    /// Refresh succeeds with `token`, which the API then accepts.
    pub fn succeeding(api: Arc<FakeApi>, token: &str) -> Self {
        Self {
            api,
            result: Ok(RefreshedTokens {
                access_token: token.to_string(),
                refresh_token: None,
            }),
            calls: AtomicUsize::new(0),
            gate: None,
            rotate: true,
        }
    }

    /// Refresh fails with `error`.
    pub fn failing(api: Arc<FakeApi>, error: AuthError) -> Self {
        Self {
            api,
            result: Err(error),
            calls: AtomicUsize::new(0),
            gate: None,
            rotate: true,
        }
    }

    /// Hold every call until [`release`](Self::release).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    /// Do not tell the API about the refreshed token.
    pub const fn without_rotation(mut self) -> Self {
        self.rotate = false;
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenRefresher for FakeRefresher {
    fn refresh<'a>(
        &'a self,
        _refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<RefreshedTokens, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Ok(tokens) = &self.result
                && self.rotate
            {
                self.api.accept(&tokens.access_token);
            }
            self.result.clone()
        })
    }
}

/// Build a gateway over `api` and `refresher`, optionally logged in.
pub async fn gateway(
    api: Arc<FakeApi>,
    refresher: Arc<FakeRefresher>,
    tokens: Option<SessionTokens>,
) -> AuthGateway {
    let store = TokenStore::new();
    if let Some(tokens) = tokens {
        store.set(tokens).await;
    }
    let coordinator = Arc::new(RefreshCoordinator::new(
        store,
        refresher,
        SessionEvents::default(),
    ));
    AuthGateway::new(api, coordinator, AuthEndpoints::default())
}

/// Yield enough times for every spawned task to reach its next await.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
