//! Extractor seam between the site-specific listing logic and the core.
//!
//! The core never parses HTML itself; it consumes an [`Extractor`] that turns
//! a series locator into ordered [`ChapterDescriptor`]s and a chapter into an
//! ordered list of page locators. A failure listing one chapter's pages is
//! isolated to that chapter; only a failure of the top-level series listing
//! aborts the run.
//!
//! The crate ships [`ManifestExtractor`], which reads a JSON series manifest
//! from disk. It is the implementation used by the CLI and the integration
//! tests; scraping extractors implement the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::ChapterDescriptor;

/// Errors raised by extraction collaborators.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The top-level series listing could not be obtained or parsed.
    ///
    /// This is the only extraction failure that aborts the whole run.
    #[error("failed to read series listing {locator}: {detail}")]
    Listing {
        /// The series locator that failed.
        locator: String,
        /// What went wrong.
        detail: String,
    },

    /// One chapter's page list could not be obtained or parsed.
    ///
    /// Isolated: sibling chapters continue.
    #[error("failed to extract pages for chapter {chapter_number}: {detail}")]
    Pages {
        /// The chapter whose extraction failed.
        chapter_number: u32,
        /// What went wrong.
        detail: String,
    },
}

impl ExtractionError {
    /// Creates a series-listing error.
    pub fn listing(locator: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Listing {
            locator: locator.into(),
            detail: detail.into(),
        }
    }

    /// Creates a per-chapter page extraction error.
    pub fn pages(chapter_number: u32, detail: impl Into<String>) -> Self {
        Self::Pages {
            chapter_number,
            detail: detail.into(),
        }
    }
}

/// Turns locators into chapter descriptors and page locator lists.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the full chapter list for a series, ascending by chapter
    /// number.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Listing`] when the series listing cannot be
    /// obtained or parsed; the run aborts.
    async fn list_chapters(
        &self,
        series_locator: &str,
    ) -> Result<Vec<ChapterDescriptor>, ExtractionError>;

    /// Returns the ordered page locators for one chapter.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Pages`]; the failure marks this chapter
    /// fully failed without aborting sibling chapters.
    async fn list_pages(
        &self,
        chapter: &ChapterDescriptor,
    ) -> Result<Vec<String>, ExtractionError>;
}

/// On-disk JSON manifest describing a series and its chapters.
#[derive(Debug, Deserialize)]
struct SeriesManifest {
    series_id: String,
    #[serde(default)]
    summary: Option<String>,
    chapters: Vec<ChapterManifest>,
}

/// One chapter entry in a [`SeriesManifest`].
#[derive(Debug, Deserialize)]
struct ChapterManifest {
    number: u32,
    title: String,
    #[serde(default)]
    author_notes: Option<String>,
    pages: Vec<String>,
}

/// Extractor backed by a JSON series manifest file.
///
/// The manifest is read once on construction; `list_chapters` and
/// `list_pages` then answer from memory. The expected shape:
///
/// ```json
/// {
///   "series_id": "tower-of-god",
///   "summary": "...",
///   "chapters": [
///     { "number": 1, "title": "1F", "pages": ["https://.../01_001.jpg"] }
///   ]
/// }
/// ```
#[derive(Debug)]
pub struct ManifestExtractor {
    path: PathBuf,
    manifest: SeriesManifest,
}

impl ManifestExtractor {
    /// Loads a manifest from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Listing`] when the file cannot be read or
    /// does not parse as a series manifest.
    pub async fn load(path: &Path) -> Result<Self, ExtractionError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ExtractionError::listing(path.display().to_string(), e.to_string()))?;

        let manifest: SeriesManifest = serde_json::from_str(&raw)
            .map_err(|e| ExtractionError::listing(path.display().to_string(), e.to_string()))?;

        debug!(
            series = %manifest.series_id,
            chapters = manifest.chapters.len(),
            "loaded series manifest"
        );

        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }
}

#[async_trait]
impl Extractor for ManifestExtractor {
    async fn list_chapters(
        &self,
        _series_locator: &str,
    ) -> Result<Vec<ChapterDescriptor>, ExtractionError> {
        let mut chapters: Vec<ChapterDescriptor> = self
            .manifest
            .chapters
            .iter()
            .map(|c| ChapterDescriptor {
                series_id: self.manifest.series_id.clone(),
                chapter_number: c.number,
                title: c.title.clone(),
                summary: self.manifest.summary.clone(),
                author_notes: c.author_notes.clone(),
                source_locator: format!("{}#{}", self.path.display(), c.number),
            })
            .collect();

        chapters.sort_by_key(|c| c.chapter_number);
        Ok(chapters)
    }

    async fn list_pages(
        &self,
        chapter: &ChapterDescriptor,
    ) -> Result<Vec<String>, ExtractionError> {
        self.manifest
            .chapters
            .iter()
            .find(|c| c.number == chapter.chapter_number)
            .map(|c| c.pages.clone())
            .ok_or_else(|| {
                ExtractionError::pages(chapter.chapter_number, "chapter not present in manifest")
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn write_manifest(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("series.json");
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_manifest_extractor_lists_chapters_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            &dir,
            r#"{
                "series_id": "demo",
                "chapters": [
                    { "number": 3, "title": "Three", "pages": ["u3"] },
                    { "number": 1, "title": "One", "pages": ["u1a", "u1b"] }
                ]
            }"#,
        )
        .await;

        let extractor = ManifestExtractor::load(&path).await.unwrap();
        let chapters = extractor.list_chapters("demo").await.unwrap();

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].chapter_number, 1);
        assert_eq!(chapters[1].chapter_number, 3);
        assert_eq!(chapters[0].title, "One");
        assert_eq!(chapters[0].series_id, "demo");
    }

    #[tokio::test]
    async fn test_manifest_extractor_lists_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            &dir,
            r#"{
                "series_id": "demo",
                "chapters": [
                    { "number": 1, "title": "One", "pages": ["a", "b", "c"] }
                ]
            }"#,
        )
        .await;

        let extractor = ManifestExtractor::load(&path).await.unwrap();
        let chapters = extractor.list_chapters("demo").await.unwrap();
        let pages = extractor.list_pages(&chapters[0]).await.unwrap();

        assert_eq!(pages, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_manifest_extractor_missing_file_is_listing_error() {
        let err = ManifestExtractor::load(Path::new("/nonexistent/series.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Listing { .. }));
    }

    #[tokio::test]
    async fn test_manifest_extractor_malformed_json_is_listing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(&dir, "{ not json").await;

        let err = ManifestExtractor::load(&path).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Listing { .. }));
    }

    #[tokio::test]
    async fn test_manifest_extractor_unknown_chapter_is_pages_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_manifest(
            &dir,
            r#"{ "series_id": "demo", "chapters": [] }"#,
        )
        .await;

        let extractor = ManifestExtractor::load(&path).await.unwrap();
        let ghost = ChapterDescriptor {
            series_id: "demo".to_string(),
            chapter_number: 42,
            title: "Ghost".to_string(),
            summary: None,
            author_notes: None,
            source_locator: "nowhere".to_string(),
        };

        let err = extractor.list_pages(&ghost).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Pages {
                chapter_number: 42,
                ..
            }
        ));
    }
}
