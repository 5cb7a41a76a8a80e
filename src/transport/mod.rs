//! Outbound HTTP for integration statistics.
//!
//! [`Transport`] is the seam between the retry engine and the network: one call
//! executes exactly one attempt under a deadline. [`ReqwestTransport`] is the
//! production implementation; tests substitute scripted transports.

mod error;

pub use error::FetchError;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;

const USER_AGENT: &str = concat!("homeboard/", env!("CARGO_PKG_VERSION"));

/// Description of an outbound statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl StatRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// HTTP response with the body already read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatResponse {
    pub status: u16,
    pub body: String,
}

impl StatResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Executes a single request attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `request`, giving up with [`FetchError::Timeout`] once `timeout` elapses.
    ///
    /// Any HTTP status, including 4xx/5xx, is `Ok`; only failures that produced
    /// no response are `Err`.
    async fn execute(
        &self,
        request: &StatRequest,
        timeout: Duration,
    ) -> Result<StatResponse, FetchError>;
}

/// [`Transport`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build tuned HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self { client }
    }

    /// Create a transport around an existing client (for testing).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &StatRequest, timeout: Duration) -> Result<reqwest::RequestBuilder, FetchError> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| FetchError::Other(format!("invalid HTTP method: {}", request.method)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::Other(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| FetchError::Other(format!("invalid value for header {}", name)))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(headers)
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &StatRequest,
        timeout: Duration,
    ) -> Result<StatResponse, FetchError> {
        let timeout_ms = timeout.as_millis() as u64;
        let builder = self.build(request, timeout)?;

        let attempt = async {
            let response = builder
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout_ms))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout_ms))?;
            Ok::<_, FetchError>(StatResponse { status, body })
        };

        // The reqwest timeout covers the request; this also bounds the body read.
        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout_ms)),
        }
    }
}
