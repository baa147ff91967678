//! HTTP client implementation using reqwest.
//!
//! This adapter implements the `HttpClient` port using the reqwest library.
//! Request paths are resolved against the configured base URL.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use reqwest::{Client, Method, Url};
use tollgate_application::{HttpClient, HttpClientError};
use tollgate_domain::{ClientSettings, Headers, HttpMethod, RequestSpec, ResponseSpec};
use tracing::debug;

/// HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Creates a client for the backend described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the client cannot be
    /// created.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, HttpClientError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {}", settings.base_url)))?;
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| HttpClientError::Other(e.to_string()))?;

        Ok(Self::with_client(client, base_url, settings.request_timeout()))
    }

    /// Creates a client around an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// The underlying reqwest client, shared with the refresh adapter.
    #[must_use]
    pub const fn inner(&self) -> &Client {
        &self.client
    }

    /// Resolves a request path and query against the base URL.
    ///
    /// The base URL's own path is kept as a prefix, so a base of
    /// `https://api.example.com/v1` and a path of `/orders` give
    /// `https://api.example.com/v1/orders`.
    ///
    /// # Errors
    ///
    /// Returns an error if the result is not a valid URL.
    pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url, HttpClientError> {
        let raw = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        let mut url =
            Url::parse(&raw).map_err(|e| HttpClientError::InvalidUrl(format!("{e}: {raw}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Maps reqwest errors to `HttpClientError`.
    fn map_error(error: &reqwest::Error, timeout: Duration) -> HttpClientError {
        if error.is_timeout() {
            return HttpClientError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            };
        }

        let host = || {
            error
                .url()
                .and_then(|u| u.host_str())
                .unwrap_or("unknown")
                .to_string()
        };

        if error.is_connect() {
            let message = error.to_string();
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return HttpClientError::DnsError {
                    host: host(),
                    message,
                };
            }
            if lower.contains("refused") {
                return HttpClientError::ConnectionRefused {
                    host: host(),
                    port: error
                        .url()
                        .and_then(Url::port_or_known_default)
                        .unwrap_or(80),
                };
            }
            return HttpClientError::ConnectionFailed(message);
        }

        HttpClientError::Other(error.to_string())
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: &'a RequestSpec,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseSpec, HttpClientError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self.resolve(&request.path, &request.query)?;
            let start = Instant::now();

            let mut builder = self
                .client
                .request(Self::to_reqwest_method(request.method), url)
                .timeout(self.timeout);

            for header in request.headers.iter() {
                builder = builder.header(&header.name, &header.value);
            }

            if let Some(content_type) = request.body.content_type()
                && request.headers.get("content-type").is_none()
            {
                builder = builder.header("Content-Type", content_type);
            }

            if !request.body.is_none() {
                let bytes = request
                    .body
                    .to_bytes()
                    .map_err(|e| HttpClientError::InvalidBody(e.to_string()))?;
                builder = builder.body(bytes);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Self::map_error(&e, self.timeout))?;

            let status = response.status().as_u16();
            let headers: Headers = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
                .collect();

            let body = response
                .bytes()
                .await
                .map_err(|e| HttpClientError::Other(format!("Failed to read body: {e}")))?
                .to_vec();

            let duration = start.elapsed();
            debug!(
                id = %request.id,
                status,
                elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "response received"
            );

            Ok(ResponseSpec::new(status, headers, body, duration))
        })
    }
}
