//! webtoon-dl core library
//!
//! Downloads comic chapters (ordered page images) from a content site under
//! concurrency and politeness constraints, and reassembles them into loose
//! files, per-chapter directories, or archive containers with strict page
//! ordering.
//!
//! # Architecture
//!
//! - [`models`] - chapter descriptors, page tasks/results, run report
//! - [`range`] - chapter range selection
//! - [`extractor`] - listing seam (trait) plus the JSON manifest extractor
//! - [`download`] - transport, retry policy engine, two-tier orchestrator
//! - [`storage`] - output layouts and the in-order chapter assembler
//! - [`transform`] - write-time page transforms
//! - [`export`] - chapter/series metadata export
//! - [`events`] - progress event channel
//!
//! Site-specific HTML extraction, terminal rendering, and image re-encoding
//! live behind the [`extractor::Extractor`], [`events`], and
//! [`transform::PageTransform`] seams respectively.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod events;
pub mod export;
pub mod extractor;
pub mod models;
pub mod range;
pub mod storage;
pub mod transform;

// Re-export commonly used types
pub use download::{
    BackoffStrategy, DEFAULT_CONCURRENT_CHAPTERS, DEFAULT_CONCURRENT_PAGES, DEFAULT_MAX_ATTEMPTS,
    DownloadEngine, EngineConfig, EngineError, FailureKind, FetchError, HttpClient, PageFetcher,
    RetryDecision, RetryPolicy, SeriesDownloader, SeriesError, SeriesOptions,
    classify_fetch_error, parse_retry_after,
};
pub use events::ProgressEvent;
pub use export::{ExportFormat, MetadataExporter};
pub use extractor::{ExtractionError, Extractor, ManifestExtractor};
pub use models::{
    ChapterDescriptor, ChapterOutcome, ChapterStatus, PageErrorKind, PageResult, PageTask,
    RunReport,
};
pub use range::{ChapterRange, RangeError, select_chapters};
pub use storage::{ArchiveFormat, OutputLayout, OutputOptions, StorageError};
pub use transform::{ConversionError, FormatTransform, ImageFormat, PageTransform};
