//! Artifact writers

use crate::PageResponse;
use std::path::PathBuf;

pub mod json;
pub mod path;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("file operation '{operation}' failed for '{}': {source}", .path.display())]
    IoError {
        /// What was being done
        operation: &'static str,
        /// File or directory involved
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Persists one page as an artifact
pub trait ArtifactWriter: Send + Sync {
    /// Write `page` for `country` / `page_number`, returning the artifact path
    fn write_page(
        &self,
        page: &PageResponse,
        country: &str,
        page_number: u32,
    ) -> OutputResult<PathBuf>;
}
