//! Core data types shared across the download pipeline.
//!
//! The types here form the contract between the extractor collaborator, the
//! download orchestrator, the output assembler, and the caller-facing run
//! report. Descriptors are produced once by the extractor and are read-only
//! to the rest of the pipeline.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

/// An immutable description of one chapter of a series.
///
/// Produced by the extractor from the series listing. The chapter number is
/// the ordering key and may be non-contiguous (series drop or renumber
/// chapters). Page locators are not carried here; they are produced by
/// [`crate::extractor::Extractor::list_pages`] when the chapter download
/// begins, so a broken chapter page cannot poison the series listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterDescriptor {
    /// Identifier of the series this chapter belongs to.
    pub series_id: String,

    /// Released chapter number; ordering key, possibly non-contiguous.
    pub chapter_number: u32,

    /// Chapter title.
    pub title: String,

    /// Series- or chapter-level summary, when the listing carries one.
    pub summary: Option<String>,

    /// Author notes attached to the chapter, when present.
    pub author_notes: Option<String>,

    /// Opaque handle the extractor understands (typically the viewer URL).
    pub source_locator: String,
}

/// One page fetch unit: a locator tagged with its position.
///
/// Created by the orchestrator when a chapter enters `Fetching` and consumed
/// when its [`PageResult`] reaches the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTask {
    /// Chapter this page belongs to.
    pub chapter_number: u32,

    /// Zero-based index defining the page's position in the final output.
    pub page_index: usize,

    /// Opaque handle used to fetch the page bytes.
    pub page_locator: String,
}

/// Classification of a terminal page failure, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageErrorKind {
    /// Transient network failure that exhausted its retry budget.
    Transient,

    /// Permanent network failure (resource gone, malformed response).
    Permanent,

    /// Rate limiting that persisted through the retry budget.
    RateLimited,

    /// Local write-time transform failure; never retried.
    Conversion,
}

/// Successfully fetched page bytes, ready for the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSuccess {
    /// Raw page bytes as received from the transport.
    pub bytes: Vec<u8>,

    /// Content-Type reported by the server, if any.
    pub content_type: Option<String>,
}

/// Terminal outcome of a [`PageTask`].
///
/// Ownership transfers from the fetch unit to the output assembler, which is
/// the sole writer and writes each page index at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    /// The page bytes were fetched.
    Success(PageSuccess),

    /// The fetch failed terminally.
    Failure {
        /// Why the page failed.
        kind: PageErrorKind,
        /// Total attempts made before giving up.
        attempts_made: u32,
    },
}

impl PageResult {
    /// Returns `true` for [`PageResult::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Terminal status of one chapter at the end of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChapterStatus {
    /// Every page succeeded.
    Complete,

    /// Some pages succeeded, some failed terminally.
    PartialFailure,

    /// No output was produced (extraction failed or every page failed).
    Failed,

    /// The chapter did not reach `Done` before cancellation or timeout.
    Cancelled,
}

/// Aggregate over all page results of one chapter.
///
/// Finalized only after every page task the chapter owns has reached a
/// terminal state, or the chapter was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOutcome {
    /// The chapter this outcome describes.
    pub chapter_number: u32,

    /// Terminal status.
    pub status: ChapterStatus,

    /// Number of pages committed to the output.
    pub succeeded_count: usize,

    /// Page indices that failed terminally (recorded gaps).
    pub failed_page_indices: BTreeSet<usize>,

    /// Where the chapter's output landed, when any output was produced.
    pub output_location: Option<PathBuf>,
}

impl ChapterOutcome {
    /// Builds a `Failed` outcome for a chapter that produced no output.
    #[must_use]
    pub fn failed(chapter_number: u32) -> Self {
        Self {
            chapter_number,
            status: ChapterStatus::Failed,
            succeeded_count: 0,
            failed_page_indices: BTreeSet::new(),
            output_location: None,
        }
    }

    /// Builds a `Cancelled` outcome for a chapter that never reached `Done`.
    #[must_use]
    pub fn cancelled(chapter_number: u32) -> Self {
        Self {
            chapter_number,
            status: ChapterStatus::Cancelled,
            succeeded_count: 0,
            failed_page_indices: BTreeSet::new(),
            output_location: None,
        }
    }
}

/// Aggregate over all chapter outcomes for one invocation.
///
/// Drives the caller's exit-status decision: the run is only a full success
/// if every selected chapter completed with all pages.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Per-chapter outcomes, in completion order.
    pub outcomes: Vec<ChapterOutcome>,
}

impl RunReport {
    /// Total chapters attempted.
    #[must_use]
    pub fn chapters_attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Chapters where every page succeeded.
    #[must_use]
    pub fn fully_succeeded(&self) -> usize {
        self.count(ChapterStatus::Complete)
    }

    /// Chapters with at least one committed page and at least one gap.
    #[must_use]
    pub fn partially_failed(&self) -> usize {
        self.count(ChapterStatus::PartialFailure)
    }

    /// Chapters that produced no output.
    #[must_use]
    pub fn fully_failed(&self) -> usize {
        self.count(ChapterStatus::Failed)
    }

    /// Chapters cancelled before reaching `Done`.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.count(ChapterStatus::Cancelled)
    }

    /// Returns `true` when every attempted chapter fully succeeded.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == ChapterStatus::Complete)
    }

    fn count(&self, status: ChapterStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}
