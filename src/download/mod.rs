//! Download engine: transport, retry policy, and the two-tier orchestrator.
//!
//! # Structure
//!
//! - [`client`] - reqwest-backed transport behind the [`PageFetcher`] seam
//! - [`retry`] - backoff strategies and the retry decision contract
//! - [`error`] - fetch errors and transient/permanent classification
//! - [`engine`] - chapter/page scheduling, cancellation, outcome aggregation
//! - [`series`] - facade tying extractor, range selection and engine together

pub mod client;
pub mod engine;
pub mod error;
pub mod retry;
pub mod series;

pub use client::{FetchedPage, HttpClient, PageFetcher};
pub use engine::{
    DEFAULT_CONCURRENT_CHAPTERS, DEFAULT_CONCURRENT_PAGES, DownloadEngine, EngineConfig,
    EngineError, RunOptions,
};
pub use error::{FailureKind, FetchError, classify_fetch_error};
pub use retry::{
    BackoffStrategy, DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy, parse_retry_after,
};
pub use series::{SeriesDownloader, SeriesError, SeriesOptions};
