//! Series-level facade wiring the pipeline together.
//!
//! Mirrors the shape a caller wants: hand over an extractor and a set of
//! options, get back a [`RunReport`]. Range selection happens here, before
//! any page work; only a failure of the top-level series listing aborts the
//! run.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::HttpClient;
use super::engine::{DownloadEngine, EngineConfig, EngineError, RunOptions};
use super::error::FetchError;
use crate::events::ProgressEvent;
use crate::export::{ExportFormat, MetadataExporter};
use crate::extractor::{ExtractionError, Extractor};
use crate::models::RunReport;
use crate::range::{ChapterRange, RangeError, select_chapters};
use crate::storage::OutputOptions;
use crate::transform::{FormatTransform, ImageFormat, PageTransform};

/// Everything the caller configures for one series download.
#[derive(Debug, Clone)]
pub struct SeriesOptions {
    /// Locator of the series listing, passed to the extractor.
    pub series_locator: String,

    /// Chapter bounds.
    pub range: ChapterRange,

    /// Output location and layout.
    pub output: OutputOptions,

    /// Pool sizes, retry contract, chapter ceiling.
    pub engine: EngineConfig,

    /// Requested output image format; `None` keeps the source format.
    pub image_format: Option<ImageFormat>,

    /// Metadata export format; `None` disables export.
    pub export_format: Option<ExportFormat>,

    /// Optional proxy endpoint for all requests.
    pub proxy: Option<String>,
}

/// Errors that abort a series download before or at startup.
///
/// Per-chapter and per-page failures never surface here; they are reported
/// through the [`RunReport`].
#[derive(Debug, Error)]
pub enum SeriesError {
    /// The series listing could not be obtained or parsed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Contradictory chapter bounds.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Invalid engine configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The transport could not be constructed (bad proxy endpoint).
    #[error(transparent)]
    Transport(#[from] FetchError),
}

/// Downloads chapters of one series.
pub struct SeriesDownloader {
    engine: DownloadEngine,
    extractor: Arc<dyn Extractor>,
    options: SeriesOptions,
}

impl SeriesDownloader {
    /// Builds the downloader and its engine.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::Engine`] on invalid pool configuration.
    pub fn new(
        extractor: Arc<dyn Extractor>,
        options: SeriesOptions,
    ) -> Result<Self, SeriesError> {
        let engine = DownloadEngine::new(options.engine.clone())?;
        Ok(Self {
            engine,
            extractor,
            options,
        })
    }

    /// Subscribes to progress events for this run.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.engine.subscribe()
    }

    /// Returns the token that cancels the run.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.engine.cancellation_token()
    }

    /// Lists chapters, selects the requested range, and downloads it.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError`] only for run-aborting conditions: a failed
    /// series listing, contradictory bounds, or an unusable transport.
    pub async fn run(&self) -> Result<RunReport, SeriesError> {
        let fetcher = Arc::new(HttpClient::with_proxy(self.options.proxy.as_deref())?);

        let chapters = self
            .extractor
            .list_chapters(&self.options.series_locator)
            .await?;
        info!(available = chapters.len(), "series listing fetched");

        let selected = select_chapters(&chapters, &self.options.range)?;
        info!(selected = selected.len(), "chapters selected");

        let transform: Arc<dyn PageTransform> =
            Arc::new(FormatTransform::new(self.options.image_format));
        let exporter = self
            .options
            .export_format
            .map(|format| Arc::new(MetadataExporter::new(format, self.options.output.root.clone())));

        let report = self
            .engine
            .run(
                Arc::clone(&self.extractor),
                fetcher,
                selected,
                RunOptions {
                    output: self.options.output.clone(),
                    transform: Some(transform),
                    exporter,
                },
            )
            .await;

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::OutputLayout;

    fn options(root: std::path::PathBuf) -> SeriesOptions {
        SeriesOptions {
            series_locator: "series.json".to_string(),
            range: ChapterRange::all(),
            output: OutputOptions {
                root,
                layout: OutputLayout::Separate,
            },
            engine: EngineConfig::default(),
            image_format: None,
            export_format: None,
            proxy: None,
        }
    }

    struct EmptyExtractor;

    #[async_trait::async_trait]
    impl Extractor for EmptyExtractor {
        async fn list_chapters(
            &self,
            _series_locator: &str,
        ) -> Result<Vec<crate::models::ChapterDescriptor>, ExtractionError> {
            Ok(Vec::new())
        }

        async fn list_pages(
            &self,
            chapter: &crate::models::ChapterDescriptor,
        ) -> Result<Vec<String>, ExtractionError> {
            Err(ExtractionError::pages(chapter.chapter_number, "no pages"))
        }
    }

    #[tokio::test]
    async fn test_empty_series_is_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = SeriesDownloader::new(
            Arc::new(EmptyExtractor),
            options(dir.path().to_path_buf()),
        )
        .unwrap();

        let report = downloader.run().await.unwrap();
        assert_eq!(report.chapters_attempted(), 0);
        assert!(report.is_complete_success());
    }

    #[tokio::test]
    async fn test_invalid_range_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path().to_path_buf());
        opts.range = ChapterRange {
            start: Some(5),
            end: Some(2),
            latest: false,
        };

        let downloader = SeriesDownloader::new(Arc::new(EmptyExtractor), opts).unwrap();
        let err = downloader.run().await.unwrap_err();
        assert!(matches!(err, SeriesError::Range(_)));
    }

    #[test]
    fn test_invalid_engine_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path().to_path_buf());
        opts.engine.concurrent_pages = 0;

        let result = SeriesDownloader::new(Arc::new(EmptyExtractor), opts);
        assert!(matches!(result, Err(SeriesError::Engine(_))));
    }
}
