//! CLI error types and conversions

use crate::config::ConfigError;
use crate::downloader::DownloadAborted;
use crate::fetcher::TransportError;
use crate::metrics::MetricsError;
use crate::publisher::PublishError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// The run stopped before its last page
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadAborted),

    /// Publisher setup or shutdown error
    #[error("publisher error: {0}")]
    PublishError(#[from] PublishError),

    /// HTTP client could not be built
    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    /// Metrics exporter could not be installed
    #[error("metrics error: {0}")]
    MetricsError(#[from] MetricsError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
