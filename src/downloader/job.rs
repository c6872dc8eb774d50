//! Download request and run result structures

use crate::SortBy;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Largest page size the provider accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size for new requests
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A request failed validation before any network interaction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error for field '{field}': {message}")]
pub struct ValidationError {
    /// Offending field
    pub field: &'static str,
    /// What is wrong with it
    pub message: &'static str,
}

impl ValidationError {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// What to download
///
/// Empty strings in the optional filters are treated as absent and never sent.
#[derive(Clone)]
pub struct DownloadRequest {
    /// Provider API key
    pub api_key: String,
    /// Free-text search query
    pub query: Option<String>,
    /// Two-letter country code, also used in artifact file names
    pub country: Option<String>,
    /// Oldest publication time to include
    pub from: Option<DateTime<Utc>>,
    /// Newest publication time to include
    pub to: Option<DateTime<Utc>>,
    /// Two-letter language code
    pub language: Option<String>,
    /// `relevancy`, `popularity`, `publishedAt` or empty
    pub sort_by: String,
    /// Results per page, 1..=100
    pub page_size: u32,
    /// First page to fetch, 1-based
    pub start_page: u32,
}

impl DownloadRequest {
    /// Create a request for `country` with default paging
    pub fn new(api_key: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            query: None,
            country: Some(country.into()),
            from: None,
            to: None,
            language: None,
            sort_by: SortBy::PublishedAt.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            start_page: 1,
        }
    }

    /// Set the search query
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the publication window
    pub fn with_window(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Set the results per page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the first page to fetch
    pub fn with_start_page(mut self, start_page: u32) -> Self {
        self.start_page = start_page;
        self
    }

    /// Country filter, if set and non-empty
    pub fn country(&self) -> Option<&str> {
        non_empty(&self.country)
    }

    /// Query filter, if set and non-empty
    pub fn query(&self) -> Option<&str> {
        non_empty(&self.query)
    }

    /// Language filter, if set and non-empty
    pub fn language(&self) -> Option<&str> {
        non_empty(&self.language)
    }

    /// Label used in logs, metrics and artifact file names
    pub fn target(&self) -> &str {
        self.country().or_else(|| self.query()).unwrap_or_default()
    }

    /// Validate request parameters
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key.is_empty() {
            return Err(ValidationError::new("api_key", "cannot be empty"));
        }

        if self.country().is_none() && self.query().is_none() {
            return Err(ValidationError::new(
                "country/query",
                "either country or query must be specified",
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::new("page_size", "must be between 1 and 100"));
        }

        if self.start_page < 1 {
            return Err(ValidationError::new("start_page", "must be >= 1"));
        }

        if !self.sort_by.is_empty() && SortBy::from_str(&self.sort_by).is_err() {
            return Err(ValidationError::new(
                "sort_by",
                "must be one of: relevancy, popularity, publishedAt",
            ));
        }

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl std::fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("api_key", &"<redacted>")
            .field("query", &self.query)
            .field("country", &self.country)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("language", &self.language)
            .field("sort_by", &self.sort_by)
            .field("page_size", &self.page_size)
            .field("start_page", &self.start_page)
            .finish()
    }
}

/// Pipeline stage at which a page failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// Fetching or decoding the page
    Fetch,
    /// Writing the artifact
    Write,
    /// Announcing the artifact on the queue
    Publish,
}

impl FailureStage {
    /// Stage name as used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Fetch => "fetch",
            FailureStage::Write => "write",
            FailureStage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal failure recorded against one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    /// Page number the failure belongs to
    pub page: u32,
    /// Stage that failed
    pub stage: FailureStage,
    /// Error text
    pub message: String,
}

impl std::fmt::Display for PageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} ({}): {}", self.page, self.stage, self.message)
    }
}

/// Statistics of one download run
///
/// Returned on normal completion and carried by aborted runs as the partial
/// result accumulated so far.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    /// Size of the whole result set as reported by the first page
    pub total_articles: u64,
    /// Pages fetched and persisted
    pub pages_downloaded: u32,
    /// Artifact paths, in page order
    pub file_paths: Vec<PathBuf>,
    /// When the run started
    pub start_time: DateTime<Utc>,
    /// When the run ended
    pub end_time: DateTime<Utc>,
    /// Wall-clock run time
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Per-page failures that did not stop the run
    pub errors: Vec<PageFailure>,
}

impl DownloadResult {
    /// Empty result for a run starting at `start_time`
    pub fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            total_articles: 0,
            pages_downloaded: 0,
            file_paths: Vec::new(),
            start_time,
            end_time: start_time,
            duration: Duration::ZERO,
            errors: Vec::new(),
        }
    }

    /// Stamp the end of the run
    pub fn finish(&mut self, end_time: DateTime<Utc>) {
        self.end_time = end_time;
        self.duration = (end_time - self.start_time).to_std().unwrap_or_default();
    }

    /// Record a non-fatal page failure
    pub fn record_failure(&mut self, page: u32, stage: FailureStage, message: impl Into<String>) {
        self.errors.push(PageFailure {
            page,
            stage,
            message: message.into(),
        });
    }

    /// Whether any page failed along the way
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
