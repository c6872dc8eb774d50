//! Dated path generation for artifacts
//!
//! Artifacts are grouped by the UTC year and month of the write:
//! `{root}/{yyyy}/{mm}/{yyyy-mm-dd_HH-MM-SS}_{country}_page{N}.json`
//!
//! # Usage Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use news_ingest::clock::SystemClock;
//! use news_ingest::output::path::ArtifactPathGenerator;
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! let generator = ArtifactPathGenerator::new(Arc::new(SystemClock));
//! let at = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();
//! let path = generator.generate_at(Path::new("/tmp/x"), "us", 2, at);
//! assert_eq!(path.file, PathBuf::from("/tmp/x/2025/08/2025-08-15_12-00-00_us_page2.json"));
//! ```

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// A generated artifact location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPath {
    /// Directory that must exist before writing
    pub dir: PathBuf,
    /// Full file path
    pub file: PathBuf,
}

/// Builds artifact paths stamped with the clock's current time
#[derive(Clone)]
pub struct ArtifactPathGenerator {
    clock: SharedClock,
}

impl ArtifactPathGenerator {
    /// Create a generator reading time from `clock`
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Path for `page` of `country`, stamped now
    pub fn generate(&self, root: &Path, country: &str, page: u32) -> ArtifactPath {
        self.generate_at(root, country, page, self.clock.now())
    }

    /// Path for `page` of `country`, stamped at `timestamp`
    pub fn generate_at(
        &self,
        root: &Path,
        country: &str,
        page: u32,
        timestamp: DateTime<Utc>,
    ) -> ArtifactPath {
        let dir = root
            .join(timestamp.format("%Y").to_string())
            .join(timestamp.format("%m").to_string());
        let file = dir.join(format!(
            "{}_{}_page{}.json",
            timestamp.format("%Y-%m-%d_%H-%M-%S"),
            sanitize_component(country),
            page
        ));
        ArtifactPath { dir, file }
    }
}

/// Sanitize a file name component
///
/// Replaces directory separators and `..` so a label can never escape the
/// dated directory.
fn sanitize_component(name: &str) -> String {
    name.replace("..", "__").replace(['/', '\\', ':'], "_")
}
