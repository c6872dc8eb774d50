//! reqwest-backed [`Transport`]
//!
//! One `reqwest::Client` is built per transport and reused for every page so
//! connection pooling spans the whole traversal.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::fetcher::{HttpResponse, Transport, TransportError};

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Production transport over `reqwest`
///
/// Configured with explicit timeouts to prevent indefinite hangs:
/// - Connect timeout: 10 seconds (or the request timeout, if shorter)
/// - Request timeout: the configured `timeout_seconds`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport with the given overall request timeout
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let connect_timeout = request_timeout.min(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS));
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(concat!("news-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    let timeout = err.is_timeout();
    let connect = err.is_connect();
    let body = err.is_body() || err.is_decode();
    // reqwest includes the URL in its Display output; strip it so the key never leaks
    let message = err.without_url().to_string();
    if timeout {
        TransportError::Timeout(message)
    } else if connect {
        TransportError::Connect(message)
    } else if body {
        TransportError::Body {
            message,
            headers: Box::default(),
        }
    } else {
        TransportError::Request(message)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        // Headers already arrived; keep them with any body failure so the quota is still tracked
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            message: e.without_url().to_string(),
            headers: Box::new(headers.clone()),
        })?;

        debug!(status = status, bytes = body.len(), "Response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
