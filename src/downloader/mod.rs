//! Download orchestration and rate limiting
//!
//! This module provides the pagination engine that walks a result set page by
//! page, persists every page and announces it on the queue.
//!
//! # Overview
//!
//! The downloader orchestrates the complete workflow:
//!
//! 1. **Request**: Describe what to download using [`job::DownloadRequest`]
//! 2. **Execution**: Walk the pages using [`executor::DownloadExecutor`]
//! 3. **Rate Limiting**: Header-driven pacing via [`rate_limit::RateLimiter`]
//! 4. **Reporting**: Totals and per-page failures in [`job::DownloadResult`]
//!
//! # Components
//!
//! - [`executor`] - Pagination state machine
//! - [`job`] - Request, result and failure records
//! - [`rate_limit`] - Quota tracking from response headers
//! - [`config`] - Timing and threshold constants
//!
//! # Error Handling
//!
//! Per-page failures (transport, decode, write, publish) are recorded in the
//! result and the run moves on. Only three things end a run early, each
//! reported as a [`DownloadAborted`] that still carries the partial result:
//! - Validation errors (before any request)
//! - Structured API errors
//! - Cancellation

use crate::fetcher::ApiError;

pub mod config;
pub mod executor;
pub mod job;
pub mod rate_limit;

pub use executor::DownloadExecutor;
pub use job::{DownloadRequest, DownloadResult, FailureStage, PageFailure, ValidationError};
pub use rate_limit::{RateLimitSnapshot, RateLimitState, RateLimiter};

/// Reasons a run stops before its last page
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request is malformed
    #[error("invalid download request: {0}")]
    Validation(#[from] ValidationError),

    /// The provider rejected a request
    #[error("API error on page {page}: {source}")]
    Api {
        /// Page being fetched
        page: u32,
        /// Provider error
        #[source]
        source: ApiError,
    },

    /// Shutdown was requested
    #[error("download cancelled at page {page}")]
    Cancelled {
        /// Page that was next in line
        page: u32,
    },
}

/// A run that ended early, with everything it accomplished before stopping
#[derive(Debug, thiserror::Error)]
#[error("download aborted after {} pages", .partial.pages_downloaded)]
pub struct DownloadAborted {
    /// Why the run stopped
    #[source]
    pub error: DownloadError,
    /// Result accumulated up to that point
    pub partial: Box<DownloadResult>,
}

impl DownloadAborted {
    /// Whether the run stopped because of a shutdown request
    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, DownloadError::Cancelled { .. })
    }
}
