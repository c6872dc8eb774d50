//! Page fetching
//!
//! A fetch yields exactly one outcome: a parsed page, or one [`FetcherError`]
//! variant that the executor inspects by kind to decide between retrying the
//! same page, skipping it, or aborting the run.

use crate::downloader::rate_limit::RateLimitSnapshot;
use crate::PageResponse;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::time::Duration;

pub mod newsapi_http;
pub mod newsapi_parser;
pub mod transport;

/// Structured rejection reported by the provider
///
/// Retrying cannot help (bad key, malformed parameters, exhausted plan), so
/// the executor treats this as fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status of the response that carried the error
    pub status_code: u16,
    /// Provider error code, e.g. `apiKeyInvalid`
    pub code: Option<String>,
    /// Provider error message, or the raw body when it was not structured
    pub message: String,
    /// Request URL with the API key redacted
    pub url: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code.as_deref(), self.message.is_empty()) {
            (Some(code), false) => write!(
                f,
                "NewsAPI error {}: {} - {}",
                self.status_code, code, self.message
            ),
            (Some(code), true) => write!(f, "NewsAPI error {}: {}", self.status_code, code),
            (None, false) => write!(f, "NewsAPI error {}: {}", self.status_code, self.message),
            (None, true) => write!(f, "NewsAPI error {}", self.status_code),
        }
    }
}

impl std::error::Error for ApiError {}

/// Quota exhaustion reported with a 429 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    /// How long to wait before retrying the same page
    pub retry_after: Duration,
    /// When the provider's quota window resets, if advertised
    pub reset_at: Option<DateTime<Utc>>,
    /// Calls left in the window, if advertised
    pub remaining_calls: Option<u32>,
}

/// Failures of a single HTTP exchange, before any response was received
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection could not be established (DNS, refused, TLS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other request failure
    #[error("request failed: {0}")]
    Request(String),

    /// Response body could not be read after the headers arrived
    #[error("failed to read response body: {message}")]
    Body {
        /// What went wrong
        message: String,
        /// Headers of the response whose body was lost
        headers: Box<HeaderMap>,
    },
}

impl TransportError {
    /// Response headers received before the failure, if any
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            TransportError::Body { headers, .. } => Some(&**headers),
            _ => None,
        }
    }
}

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Provider quota exhausted; not a failure of the page
    #[error("rate limit exceeded, retry after {:?}", .0.retry_after)]
    RateLimited(RateLimitSignal),

    /// Structured API error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Network-level failure
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Successful status with an unreadable body
    #[error("parse error: {0}")]
    ParseError(String),

    /// Shutdown requested before the fetch completed
    #[error("fetch cancelled")]
    Cancelled,
}

impl FetcherError {
    /// Whether this failure must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetcherError::Api(_))
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Raw response returned by a [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Full response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Response with a status and body and no headers
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header, ignoring names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes());
        let value = reqwest::header::HeaderValue::from_str(value.as_ref());
        if let (Ok(name), Ok(value)) = (name, value) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// Performs one GET request
///
/// Cancellation is applied by the caller racing the returned future against
/// the shutdown signal; implementations only need to honour their own timeout.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`, returning the full response regardless of status code
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// A successfully fetched page together with the budget it reported
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Parsed page payload
    pub response: PageResponse,
    /// Rate-limit headers of this response
    pub limits: RateLimitSnapshot,
}
