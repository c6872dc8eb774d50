//! # News Ingest Library
//!
//! A periodic ingestion pipeline for paginated news search APIs. Every page of a
//! result set is downloaded, written to disk as a dated JSON artifact, and the
//! artifact's location is announced on a message queue for downstream consumers.
//!
//! ## Features
//!
//! - **Quota Aware**: Tracks the provider's rate-limit headers and pauses before the budget runs dry
//! - **Retry Semantics**: 429 responses retry the same page after the advertised reset
//! - **Partial Failure Reporting**: Per-page faults are recorded while the run keeps moving forward
//! - **Delivery Confirmation**: Queue publishes block on a bounded per-message acknowledgment
//! - **Cancellation**: Every wait point observes a shared shutdown signal
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use news_ingest::clock::SystemClock;
//! use news_ingest::config::Config;
//! use news_ingest::downloader::{DownloadExecutor, DownloadRequest};
//! use news_ingest::fetcher::newsapi_http::NewsApiClient;
//! use news_ingest::fetcher::transport::ReqwestTransport;
//! use news_ingest::output::json::JsonArtifactWriter;
//! use news_ingest::output::path::ArtifactPathGenerator;
//! use news_ingest::publisher::memory::MemoryBroker;
//! use news_ingest::publisher::producer::BrokerPublisher;
//! use news_ingest::shutdown::ShutdownCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let clock = Arc::new(SystemClock);
//! let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
//! let client = NewsApiClient::new(transport, clock.clone(), &config);
//! let writer = JsonArtifactWriter::new(ArtifactPathGenerator::new(clock.clone()), &config.output_dir);
//! let (broker, events) = MemoryBroker::new();
//! let publisher = BrokerPublisher::new(broker, events);
//!
//! let executor = DownloadExecutor::new(
//!     client,
//!     Arc::new(writer),
//!     Arc::new(publisher),
//!     clock,
//!     config,
//! )
//! .with_shutdown(ShutdownCoordinator::shared());
//!
//! let request = DownloadRequest::new("my-api-key", "us");
//! let result = executor.execute(request).await?;
//! println!("{} pages written", result.pages_downloaded);
//! executor.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`clock`] - Substitutable time source
//! - [`shutdown`] - Cancellation signal shared by every suspension point
//! - [`fetcher`] - Transport abstraction and the page-fetching API client
//! - [`downloader`] - Rate limiter, request model and the pagination executor
//! - [`output`] - Artifact path generation and JSON writers
//! - [`publisher`] - Queue publishing with delivery acknowledgment
//! - [`config`] - Pipeline configuration loading and validation
//! - [`metrics`] - Prometheus-compatible run metrics
//!
//! ## Data Types
//!
//! - [`PageResponse`] - One page of search results as returned by the provider
//! - [`Article`] - A single article in a page
//! - [`SortBy`] - Result ordering accepted by the provider

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Time source abstraction
pub mod clock;

/// Pipeline configuration
pub mod config;

/// Download orchestration and rate limiting
pub mod downloader;

/// Page fetching
pub mod fetcher;

/// Run metrics
pub mod metrics;

/// Artifact writers
pub mod output;

/// Queue publishing
pub mod publisher;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use downloader::{DownloadExecutor, DownloadRequest, DownloadResult};

/// Origin of an article
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// Provider-side source identifier (often null)
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable source name
    #[serde(default)]
    pub name: Option<String>,
}

/// Single article inside a page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Publishing source
    #[serde(default)]
    pub source: Source,
    /// Author byline
    #[serde(default)]
    pub author: Option<String>,
    /// Headline
    #[serde(default)]
    pub title: Option<String>,
    /// Short description or lede
    #[serde(default)]
    pub description: Option<String>,
    /// Canonical article URL
    #[serde(default)]
    pub url: Option<String>,
    /// Lead image URL
    #[serde(default)]
    pub url_to_image: Option<String>,
    /// Publication timestamp
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Truncated article body
    #[serde(default)]
    pub content: Option<String>,
}

/// One page of results as returned by the search API
///
/// Error payloads share this shape: a failed request carries `status = "error"`
/// together with `code` and `message`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    /// `"ok"` on success
    #[serde(default)]
    pub status: String,
    /// Size of the whole result set, not of this page
    #[serde(default)]
    pub total_results: u64,
    /// Articles on this page
    #[serde(default)]
    pub articles: Vec<Article>,
    /// Provider error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Provider error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PageResponse {
    /// Whether the page contains no articles
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Whether the payload reports a failure, regardless of HTTP status
    pub fn is_error(&self) -> bool {
        self.status != "ok" || self.code.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Convert a failed payload into an [`fetcher::ApiError`]
    ///
    /// Returns `None` when the payload reports success.
    pub fn to_api_error(&self, status_code: u16) -> Option<fetcher::ApiError> {
        if !self.is_error() {
            return None;
        }

        Some(fetcher::ApiError {
            status_code,
            code: self.code.clone().filter(|c| !c.is_empty()),
            message: self.message.clone().unwrap_or_default(),
            url: String::new(),
        })
    }
}

/// Result ordering accepted by the search API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortBy {
    /// Closest match to the query first
    #[serde(rename = "relevancy")]
    Relevancy,
    /// Most popular sources first
    #[serde(rename = "popularity")]
    Popularity,
    /// Newest first
    #[serde(rename = "publishedAt")]
    PublishedAt,
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SortBy::Relevancy => "relevancy",
            SortBy::Popularity => "popularity",
            SortBy::PublishedAt => "publishedAt",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevancy" => Ok(SortBy::Relevancy),
            "popularity" => Ok(SortBy::Popularity),
            "publishedAt" => Ok(SortBy::PublishedAt),
            _ => Err(format!("Invalid sort order: {s}")),
        }
    }
}
