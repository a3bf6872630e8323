//! HTTP transport implementation
//!
//! Implements `Transport` with reqwest against the service base URL
//! (e.g. `http://localhost:8881/api`). Request paths are appended verbatim.

use super::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::GatewayConfig;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// reqwest-backed transport.
///
/// Cheaply cloneable (shares the reqwest client internally).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout.
    ///
    /// A request exceeding `timeout` is reported as [`TransportError::Timeout`].
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GatewayConfig) -> reqwest::Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.base_url, request.path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| classify(&url, e))?;
        let status = response.status().as_u16();
        let success = response.status().is_success();
        let body = match response.text().await {
            Ok(body) => body,
            // Error bodies are never parsed; the status is what gets reported
            Err(e) if !success => {
                debug!(url = %url, status, error = %e, "Unreadable error body dropped");
                String::new()
            }
            Err(e) => return Err(classify(&url, e)),
        };

        debug!(method = %request.method, url = %url, status, "Service responded");
        Ok(ApiResponse { status, body })
    }
}

fn classify(url: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
