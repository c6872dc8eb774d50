//! Observability metrics for the ingestion pipeline
//!
//! This module records provider traffic, quota health and per-page outcomes
//! through the `metrics` facade.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for the scrape endpoint, installed only when requested
//! - Without an installed recorder every call is a no-op

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The Prometheus exporter could not be installed
    #[error("failed to install Prometheus exporter on {addr}: {reason}")]
    Install {
        /// Requested listen address
        addr: SocketAddr,
        /// Exporter error
        reason: String,
    },
}

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls return immediately.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!(%addr, "Initializing metrics system");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install {
            addr,
            reason: e.to_string(),
        })?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of HTTP requests made to the news provider"
    );

    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses received"
    );

    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request duration in seconds"
    );

    describe_counter!(
        "rate_limit_waits_total",
        Unit::Count,
        "Total number of waits imposed by quota exhaustion"
    );

    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for the quota window to reset"
    );

    describe_gauge!(
        "api_calls_remaining",
        Unit::Count,
        "Calls left in the provider's current quota window"
    );

    describe_counter!(
        "pages_downloaded_total",
        Unit::Count,
        "Total number of pages fetched and persisted"
    );

    describe_counter!(
        "page_failures_total",
        Unit::Count,
        "Total number of per-page failures by pipeline stage"
    );

    describe_counter!(
        "queue_publish_total",
        Unit::Count,
        "Total number of artifact notifications by outcome"
    );

    describe_counter!(
        "downloads_completed_total",
        Unit::Count,
        "Total number of download runs that reached the last page"
    );

    describe_counter!(
        "downloads_failed_total",
        Unit::Count,
        "Total number of download runs that aborted"
    );

    *initialized = true;
    info!(%addr, "Metrics system initialized successfully");
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Record an HTTP request with timing
pub struct HttpRequestMetrics {
    page: u32,
    start_time: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Start recording a request for `page`
    pub fn start(page: u32) -> Self {
        let correlation_id = generate_correlation_id();

        debug!(
            correlation_id = %correlation_id,
            page = page,
            "Starting HTTP request metrics"
        );

        Self {
            page,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record completion of the HTTP request
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => status_code.to_string(),
        )
        .increment(1);

        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        if status_code == 429 {
            counter!("http_429_errors_total").increment(1);

            warn!(
                correlation_id = %self.correlation_id,
                page = self.page,
                duration_ms = duration.as_millis() as u64,
                "Rate limit error (429) recorded"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            page = self.page,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP request completed"
        );
    }

    /// Record a transport failure (no status code)
    pub fn record_transport_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => "transport_error",
        )
        .increment(1);

        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            page = self.page,
            duration_ms = duration.as_millis() as u64,
            "Transport error recorded"
        );
    }

    /// Get the correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a wait imposed by quota exhaustion
pub fn record_rate_limit_wait(duration: Duration) {
    counter!("rate_limit_waits_total").increment(1);
    histogram!("rate_limit_wait_seconds").record(duration.as_secs_f64());
}

/// Record the call budget advertised by the provider
pub fn record_api_calls_remaining(remaining: u32, limit: u32) {
    gauge!("api_calls_remaining").set(f64::from(remaining));

    if limit > 0 {
        let usage_percent = (1.0 - f64::from(remaining) / f64::from(limit)) * 100.0;
        if usage_percent >= 80.0 {
            warn!(
                remaining = remaining,
                limit = limit,
                usage_percent = usage_percent,
                "Call budget usage exceeds 80% threshold"
            );
        }
    }
}

/// Record a page that was fetched and persisted
pub fn record_page_downloaded() {
    counter!("pages_downloaded_total").increment(1);
}

/// Record a per-page failure at `stage` (fetch, write or publish)
pub fn record_page_failure(stage: &'static str) {
    counter!("page_failures_total", "stage" => stage).increment(1);
}

/// Record the outcome of one artifact notification
pub fn record_queue_publish(outcome: &'static str) {
    counter!("queue_publish_total", "outcome" => outcome).increment(1);
}

/// Download run metrics
pub struct DownloadMetrics {
    target: String,
    start_time: Instant,
}

impl DownloadMetrics {
    /// Start tracking a run for `target` (country or query)
    pub fn start(target: impl Into<String>) -> Self {
        let target = target.into();

        info!(search = %target, "Download run started");

        Self {
            target,
            start_time: Instant::now(),
        }
    }

    /// Record a run that reached its last page
    pub fn record_success(&self, pages: u32, failures: usize) {
        let duration = self.start_time.elapsed();

        counter!(
            "downloads_completed_total",
            "target" => self.target.clone(),
        )
        .increment(1);

        info!(
            search = %self.target,
            pages = pages,
            failures = failures,
            duration_secs = duration.as_secs(),
            "Download run completed"
        );
    }

    /// Record a run that aborted
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "downloads_failed_total",
            "target" => self.target.clone(),
        )
        .increment(1);

        error!(
            search = %self.target,
            error = %error,
            duration_secs = duration.as_secs(),
            "Download run failed"
        );
    }
}
