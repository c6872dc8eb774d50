//! Pretty-printed JSON artifact writer

use super::path::ArtifactPathGenerator;
use super::{ArtifactWriter, OutputError, OutputResult};
use crate::PageResponse;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes each page as a pretty-printed JSON file under a dated directory
pub struct JsonArtifactWriter {
    paths: ArtifactPathGenerator,
    root: PathBuf,
}

impl JsonArtifactWriter {
    /// Create a writer rooted at `root`
    ///
    /// A relative root is resolved against the current directory at write
    /// time so returned paths are always absolute.
    pub fn new(paths: ArtifactPathGenerator, root: impl AsRef<Path>) -> Self {
        Self {
            paths,
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for artifacts
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactWriter for JsonArtifactWriter {
    fn write_page(
        &self,
        page: &PageResponse,
        country: &str,
        page_number: u32,
    ) -> OutputResult<PathBuf> {
        let root = std::path::absolute(&self.root).map_err(|source| OutputError::IoError {
            operation: "resolve output directory",
            path: self.root.clone(),
            source,
        })?;
        let target = self.paths.generate(&root, country, page_number);

        std::fs::create_dir_all(&target.dir).map_err(|source| OutputError::IoError {
            operation: "create directory",
            path: target.dir.clone(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(page)
            .map_err(|e| OutputError::SerializationError(e.to_string()))?;

        std::fs::write(&target.file, &json).map_err(|source| OutputError::IoError {
            operation: "write file",
            path: target.file.clone(),
            source,
        })?;

        debug!(
            path = %target.file.display(),
            bytes = json.len(),
            articles = page.articles.len(),
            "Artifact written"
        );
        Ok(target.file)
    }
}
