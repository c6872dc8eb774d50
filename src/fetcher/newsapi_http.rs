//! NewsAPI HTTP client
//!
//! Provides the single-page fetch used by the executor with:
//! - Quota-aware pacing through the owned [`RateLimiter`]
//! - Classification of every response into one [`FetcherError`] kind
//! - Rate-limit header tracking on every response, successful or not
//!
//! The client never retries on its own; the executor decides what to do with
//! each outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::clock::SharedClock;
use crate::config::Config;
use crate::downloader::config::RATE_LIMIT_RESET_GRACE;
use crate::downloader::job::DownloadRequest;
use crate::downloader::rate_limit::{RateLimitSnapshot, RateLimitState, RateLimiter};
use crate::fetcher::newsapi_parser::NewsApiParser;
use crate::fetcher::{
    FetchedPage, FetcherError, FetcherResult, RateLimitSignal, Transport, TransportError,
};
use crate::metrics::{record_api_calls_remaining, HttpRequestMetrics};
use crate::shutdown::ShutdownCoordinator;

/// Placeholder substituted for the API key in URLs that leave the client
const REDACTED: &str = "REDACTED";

/// Timestamp format accepted by the `from` / `to` parameters
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Single-page client for a NewsAPI-compatible endpoint
pub struct NewsApiClient {
    transport: Arc<dyn Transport>,
    rate_limiter: RateLimiter,
    clock: SharedClock,
    base_url: String,
    default_rate_limit_delay: Duration,
}

impl NewsApiClient {
    /// Create a client for the endpoint in `config`
    ///
    /// # Arguments
    /// * `transport` - HTTP transport (shared, cheap to clone)
    /// * `clock` - Time source used for quota reset arithmetic
    /// * `config` - Supplies the endpoint URL and the fallback 429 delay
    pub fn new(transport: Arc<dyn Transport>, clock: SharedClock, config: &Config) -> Self {
        Self {
            transport,
            rate_limiter: RateLimiter::new(clock.clone()),
            clock,
            base_url: config.base_url.clone(),
            default_rate_limit_delay: config.default_rate_limit_delay(),
        }
    }

    /// Current quota state as tracked from response headers
    pub fn rate_limit_status(&self) -> RateLimitState {
        self.rate_limiter.status()
    }

    /// The limiter owned by this client
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Fetch one page
    ///
    /// # Errors
    /// - [`FetcherError::Cancelled`] when shutdown was requested before a response arrived
    /// - [`FetcherError::RateLimited`] on a 429 response
    /// - [`FetcherError::Api`] for any other non-200 status or an error payload
    /// - [`FetcherError::Transport`] when no response was received
    /// - [`FetcherError::ParseError`] when a 200 body cannot be decoded
    pub async fn fetch_page(
        &self,
        shutdown: &ShutdownCoordinator,
        request: &DownloadRequest,
        page: u32,
    ) -> FetcherResult<FetchedPage> {
        self.rate_limiter
            .wait_if_needed(shutdown)
            .await
            .map_err(|_| FetcherError::Cancelled)?;

        let url = self.build_url(request, page, &request.api_key)?;
        let redacted_url = self.build_url(request, page, REDACTED)?;

        debug!(page = page, url = %redacted_url, "Requesting page");

        let metrics = HttpRequestMetrics::start(page);
        let response = match shutdown.run_until_shutdown(self.transport.get(url.as_str())).await {
            Err(_) => return Err(FetcherError::Cancelled),
            Ok(Err(e)) => {
                metrics.record_transport_error();
                if let Some(headers) = e.headers() {
                    self.track_limits(&RateLimitSnapshot::from_headers(headers));
                }
                return Err(FetcherError::Transport(e));
            }
            Ok(Ok(response)) => response,
        };
        metrics.record_complete(response.status);

        let limits = RateLimitSnapshot::from_headers(&response.headers);
        self.track_limits(&limits);

        match response.status {
            429 => {
                let signal = self.rate_limit_signal(&limits);
                warn!(
                    page = page,
                    retry_after_ms = signal.retry_after.as_millis() as u64,
                    remaining = ?signal.remaining_calls,
                    "Rate limited by provider"
                );
                Err(FetcherError::RateLimited(signal))
            }
            200 => {
                let page_response =
                    NewsApiParser::parse_page(response.status, &response.body, redacted_url.as_str())?;
                debug!(
                    page = page,
                    articles = page_response.articles.len(),
                    total_results = page_response.total_results,
                    "Page received"
                );
                Ok(FetchedPage {
                    response: page_response,
                    limits,
                })
            }
            status => Err(FetcherError::Api(NewsApiParser::parse_error(
                status,
                &response.body,
                redacted_url.as_str(),
            ))),
        }
    }

    fn track_limits(&self, limits: &RateLimitSnapshot) {
        self.rate_limiter.update_from_headers(limits);
        if let Some(remaining) = limits.remaining {
            record_api_calls_remaining(remaining, self.rate_limiter.status().limit);
        }
    }

    /// Wait advice for a 429 response, based on that response's own headers
    fn rate_limit_signal(&self, limits: &RateLimitSnapshot) -> RateLimitSignal {
        let until_reset = limits
            .reset_at
            .and_then(|reset_at| (reset_at - self.clock.now()).to_std().ok())
            .filter(|until| !until.is_zero());

        RateLimitSignal {
            retry_after: until_reset
                .map(|until| until + RATE_LIMIT_RESET_GRACE)
                .unwrap_or(self.default_rate_limit_delay),
            reset_at: limits.reset_at,
            remaining_calls: limits.remaining,
        }
    }

    /// Build the request URL for `page`, embedding `api_key`
    pub fn build_url(
        &self,
        request: &DownloadRequest,
        page: u32,
        api_key: &str,
    ) -> FetcherResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            FetcherError::Transport(TransportError::Request(format!(
                "invalid base URL '{}': {e}",
                self.base_url
            )))
        })?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(q) = request.query() {
                query.append_pair("q", q);
            }
            if let Some(country) = request.country() {
                query.append_pair("country", country);
            }
            if let Some(language) = request.language() {
                query.append_pair("language", language);
            }
            if !request.sort_by.is_empty() {
                query.append_pair("sortBy", &request.sort_by);
            }
            query.append_pair("pageSize", &request.page_size.to_string());
            query.append_pair("page", &page.to_string());
            query.append_pair("apiKey", api_key);
            if let Some(from) = request.from {
                query.append_pair("from", &from.format(TIMESTAMP_FORMAT).to_string());
            }
            if let Some(to) = request.to {
                query.append_pair("to", &to.format(TIMESTAMP_FORMAT).to_string());
            }
        }

        Ok(url)
    }
}
