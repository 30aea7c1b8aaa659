//! Chapter range selection.
//!
//! Given the full ordered chapter list and caller-supplied bounds, computes
//! the ordered subset of chapters to fetch. Chapters outside the bounds are
//! excluded before any network work happens.

use thiserror::Error;

use crate::models::ChapterDescriptor;

/// Caller-supplied chapter bounds.
///
/// Unspecified bounds mean "no constraint": a missing start selects from the
/// first available chapter, a missing end selects through the last. The
/// `latest` flag overrides both bounds and selects exactly the
/// highest-numbered chapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterRange {
    /// Inclusive lower bound on chapter number.
    pub start: Option<u32>,

    /// Inclusive upper bound on chapter number.
    pub end: Option<u32>,

    /// Select only the highest-numbered chapter, ignoring start/end.
    pub latest: bool,
}

impl ChapterRange {
    /// A range with no constraints (every chapter).
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A range selecting only the latest chapter.
    #[must_use]
    pub fn latest_only() -> Self {
        Self {
            latest: true,
            ..Self::default()
        }
    }
}

/// Error for contradictory caller input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// Both bounds were supplied and the literal end precedes the start.
    ///
    /// Distinct from the empty-clamp case (bounds outside the available
    /// chapters), which is silently accepted and yields an empty selection.
    #[error("invalid range: end chapter {end} precedes start chapter {start}")]
    InvalidRange {
        /// The literal start bound.
        start: u32,
        /// The literal end bound.
        end: u32,
    },
}

/// Selects the ordered subsequence of `chapters` matching `range`.
///
/// The input list is expected to be ascending by chapter number; the output
/// preserves input order. A range that clamps to nothing yields an empty
/// selection, not an error.
///
/// # Errors
///
/// Returns [`RangeError::InvalidRange`] only when both bounds are supplied
/// and `end < start` in the caller's literal input (and `latest` is not set).
pub fn select_chapters(
    chapters: &[ChapterDescriptor],
    range: &ChapterRange,
) -> Result<Vec<ChapterDescriptor>, RangeError> {
    if range.latest {
        // Max rather than last element: the list is expected ascending, but
        // the contract is "highest-numbered chapter" regardless.
        return Ok(chapters
            .iter()
            .max_by_key(|c| c.chapter_number)
            .cloned()
            .into_iter()
            .collect());
    }

    if let (Some(start), Some(end)) = (range.start, range.end) {
        if end < start {
            return Err(RangeError::InvalidRange { start, end });
        }
    }

    let start = range.start.unwrap_or(u32::MIN);
    let end = range.end.unwrap_or(u32::MAX);

    Ok(chapters
        .iter()
        .filter(|c| (start..=end).contains(&c.chapter_number))
        .cloned()
        .collect())
}
