//! Request specification type

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AUTHORIZATION, Headers, HttpMethod, RequestBody};
use crate::auth::bearer;
use crate::error::{DomainError, DomainResult};

/// Outbound request against the API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Unique identifier, used to correlate log lines across a replay
    pub id: Uuid,
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    /// Query parameters in insertion order
    #[serde(default)]
    pub query: Vec<(String, String)>,
    /// HTTP headers
    #[serde(default)]
    pub headers: Headers,
    /// Request body
    #[serde(default)]
    pub body: RequestBody,
    /// Set once the request has been replayed after a token refresh
    #[serde(default)]
    pub retried: bool,
}

impl RequestSpec {
    /// Creates a request with no body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: RequestBody::None,
            retried: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Creates a request carrying a JSON body.
    #[must_use]
    pub fn json(method: HttpMethod, path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(method, path).with_body(RequestBody::json(value))
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Adds a header, replacing one of the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Attaches `access_token` as the bearer credential, or strips any
    /// credential when `None`.
    pub fn authorize(&mut self, access_token: Option<&str>) {
        match access_token {
            Some(token) => self.headers.set(AUTHORIZATION, bearer(token)),
            None => self.headers.remove(AUTHORIZATION),
        }
    }

    /// Returns the bearer token this request carries, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.strip_prefix("Bearer "))
    }

    /// Checks that the path is a relative API path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not start with `/` or names a
    /// scheme.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.path.starts_with('/') || self.path.starts_with("//") {
            return Err(DomainError::InvalidPath(self.path.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_get_request() {
        let req = RequestSpec::get("/products").with_query("page", "2");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.query, vec![("page".to_string(), "2".to_string())]);
        assert!(!req.retried);
    }

    #[test]
    fn test_authorize_and_read_back() {
        let mut req = RequestSpec::json(HttpMethod::Post, "/cart/items", json!({"sku": "A1"}));
        assert_eq!(req.bearer_token(), None);

        req.authorize(Some("T1"));
        assert_eq!(req.headers.get(AUTHORIZATION), Some("Bearer T1"));
        assert_eq!(req.bearer_token(), Some("T1"));

        req.authorize(Some("T2"));
        assert_eq!(req.bearer_token(), Some("T2"));

        req.authorize(None);
        assert_eq!(req.bearer_token(), None);
    }

    #[test]
    fn test_validate_path() {
        assert!(RequestSpec::get("/orders/42").validate().is_ok());
        assert!(RequestSpec::get("orders").validate().is_err());
        assert!(RequestSpec::get("//evil.example.com/x").validate().is_err());
    }
}
