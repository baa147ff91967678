//! Auth endpoint table

use serde::{Deserialize, Serialize};

/// Paths of the authentication endpoints.
///
/// A `401` from any of these is final: it is surfaced to the caller and
/// never triggers a token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    /// Login endpoint.
    pub login: String,
    /// Registration endpoint.
    pub register: String,
    /// Token refresh endpoint.
    pub refresh: String,
    /// Logout endpoint.
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            register: "/auth/register".to_string(),
            refresh: "/auth/refresh".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

impl AuthEndpoints {
    /// Returns true if `path` addresses one of the auth endpoints.
    ///
    /// Query strings and trailing slashes are ignored.
    #[must_use]
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        let path = normalize(path);
        [&self.login, &self.register, &self.refresh, &self.logout]
            .into_iter()
            .any(|endpoint| normalize(endpoint) == path)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
