//! In-order chapter assembly from out-of-order page completions.
//!
//! The assembler is the sole writer for a chapter. Page results arrive in
//! completion order; the assembler holds them in a pending map and commits
//! the longest ready prefix to the sink on every arrival, so the sink always
//! sees strictly ascending page indices. Exhausted failures become recorded
//! gaps: the cursor advances past them and the remaining pages still land.
//! Memory is bounded by the out-of-order window, not the chapter size.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::naming::{NameStyle, PageNamer, chapter_label, extension_for};
use super::{FolderSink, OutputLayout, OutputOptions, PageSink, StorageError, ZipSink};
use crate::models::{PageResult, PageTask};
use crate::transform::PageTransform;

/// A terminal page result waiting for its turn to commit.
enum Entry {
    /// Fetched bytes plus the extension derived from content type/locator.
    Ready { bytes: Vec<u8>, ext: String },

    /// Exhausted failure; committing records a gap.
    Gap,
}

/// Assembles one chapter's pages into its sink in page-index order.
pub struct ChapterAssembler {
    chapter_number: u32,
    sink: Box<dyn PageSink>,
    namer: PageNamer,
    transform: Option<Arc<dyn PageTransform>>,
    total: usize,
    next_index: usize,
    pending: BTreeMap<usize, Entry>,
    succeeded: usize,
    failed: BTreeSet<usize>,
}

impl std::fmt::Debug for ChapterAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChapterAssembler")
            .field("chapter_number", &self.chapter_number)
            .field("total", &self.total)
            .field("next_index", &self.next_index)
            .field("succeeded", &self.succeeded)
            .field("failed", &self.failed)
            .finish()
    }
}

impl ChapterAssembler {
    /// Creates the assembler and its sink for one chapter.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the sink cannot be created (unwritable
    /// output directory, archive file creation failure).
    pub fn new(
        output: &OutputOptions,
        chapter_number: u32,
        chapter_pad: usize,
        total_pages: usize,
        transform: Option<Arc<dyn PageTransform>>,
    ) -> Result<Self, StorageError> {
        let label = chapter_label(chapter_number, chapter_pad);

        let (sink, style): (Box<dyn PageSink>, NameStyle) = match output.layout {
            OutputLayout::Flat => (
                Box::new(FolderSink::new(output.root.clone())),
                NameStyle::Flat,
            ),
            OutputLayout::Separate => (
                Box::new(FolderSink::new(output.root.join(&label))),
                NameStyle::Bare,
            ),
            OutputLayout::Archive(format) => {
                let container = output
                    .root
                    .join(format!("{label}.{}", format.extension()));
                (Box::new(ZipSink::new(container)?), NameStyle::Bare)
            }
        };

        Ok(Self {
            chapter_number,
            sink,
            namer: PageNamer::new(style, label, total_pages),
            transform,
            total: total_pages,
            next_index: 0,
            pending: BTreeMap::new(),
            succeeded: 0,
            failed: BTreeSet::new(),
        })
    }

    /// Accepts one terminal page result and commits every ready page.
    ///
    /// Duplicate results for an index that already reached a terminal state
    /// are ignored: each page is written at most once, retries included.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the sink rejects a write; the chapter
    /// cannot continue.
    pub fn accept(&mut self, task: &PageTask, result: PageResult) -> Result<(), StorageError> {
        let index = task.page_index;

        if index >= self.total {
            warn!(
                chapter = self.chapter_number,
                index,
                total = self.total,
                "page index out of range, dropping result"
            );
            return Ok(());
        }

        if index < self.next_index || self.pending.contains_key(&index) {
            warn!(
                chapter = self.chapter_number,
                index, "duplicate page result, dropping"
            );
            return Ok(());
        }

        let entry = match result {
            PageResult::Success(page) => Entry::Ready {
                ext: extension_for(page.content_type.as_deref(), &task.page_locator),
                bytes: page.bytes,
            },
            PageResult::Failure { kind, attempts_made } => {
                debug!(
                    chapter = self.chapter_number,
                    index,
                    ?kind,
                    attempts = attempts_made,
                    "recording page gap"
                );
                Entry::Gap
            }
        };

        self.pending.insert(index, entry);
        self.flush_ready()
    }

    /// Commits the longest ready prefix to the sink.
    fn flush_ready(&mut self) -> Result<(), StorageError> {
        while let Some(entry) = self.pending.remove(&self.next_index) {
            let index = self.next_index;
            self.next_index += 1;

            match entry {
                Entry::Gap => {
                    self.failed.insert(index);
                }
                Entry::Ready { bytes, ext } => match self.apply_transform(bytes, ext) {
                    Some((bytes, ext)) => {
                        let name = self.namer.page_file_name(index, &ext);
                        self.sink.write_page(&name, &bytes)?;
                        self.succeeded += 1;
                    }
                    None => {
                        // Conversion failure demotes the page; never refetched.
                        self.failed.insert(index);
                    }
                },
            }
        }
        Ok(())
    }

    fn apply_transform(&self, bytes: Vec<u8>, ext: String) -> Option<(Vec<u8>, String)> {
        let Some(transform) = self.transform.as_ref() else {
            return Some((bytes, ext));
        };
        match transform.apply(bytes, &ext) {
            Ok(out) => Some(out),
            Err(e) => {
                warn!(
                    chapter = self.chapter_number,
                    error = %e,
                    "page transform failed, recording gap"
                );
                None
            }
        }
    }

    /// Returns `true` once every owned page index reached a terminal state.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.next_index == self.total
    }

    /// Number of pages committed so far.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Indices recorded as gaps so far.
    #[must_use]
    pub fn failed_indices(&self) -> &BTreeSet<usize> {
        &self.failed
    }

    /// Completes the sink. Returns the output location, or `None` when no
    /// page was committed (an all-failed chapter leaves no artifact).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the sink cannot be made durable.
    pub fn finalize(mut self) -> Result<Option<PathBuf>, StorageError> {
        if self.succeeded == 0 {
            return Ok(self.sink.abort());
        }
        self.sink.finalize().map(Some)
    }

    /// Aborts the chapter: partial containers are discarded; complete loose
    /// files stay. Returns the location of whatever remains valid.
    pub fn abort(mut self) -> Option<PathBuf> {
        self.sink.abort()
    }
}
