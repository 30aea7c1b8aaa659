//! Output assembly: layouts, sinks, and the in-order chapter assembler.
//!
//! The assembler consumes page results as they arrive (in any order) and
//! materializes one of three layouts, chosen once per run:
//!
//! - **Flat**: all chapters' pages in one directory, filenames encode
//!   chapter and page with zero-padded indices.
//! - **Separate**: one subdirectory per chapter.
//! - **Archive**: one zip/cbz container per chapter, entries emitted in
//!   ascending page order, written to a `.part` file and renamed on
//!   finalization so cancellation never leaves a corrupt container.

mod archive;
mod assembler;
mod folder;
pub mod naming;

use std::path::PathBuf;

use thiserror::Error;

pub use archive::ZipSink;
pub use assembler::ChapterAssembler;
pub use folder::FolderSink;
pub use naming::{NameStyle, PageNamer, chapter_label, extension_for, pad_width};

/// Container format for the archive layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Plain zip container.
    Zip,

    /// Comic book zip; identical container, comic-reader-friendly extension.
    Cbz,
}

impl ArchiveFormat {
    /// File extension for the container.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Cbz => "cbz",
        }
    }
}

/// On-disk representation, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// All pages in one directory.
    Flat,

    /// One subdirectory per chapter.
    Separate,

    /// One container file per chapter.
    Archive(ArchiveFormat),
}

/// Where and how the run's output is materialized.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Root output directory.
    pub root: PathBuf,

    /// Layout for all chapters of this run.
    pub layout: OutputLayout,
}

/// Errors from the output assembly layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Archive container error.
    #[error("archive error at {path}: {source}")]
    Archive {
        /// Path of the container being written.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },
}

impl StorageError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an archive error with path context.
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}

/// One chapter's byte sink.
///
/// The assembler calls `write_page` strictly in ascending page order; sinks
/// never reorder. `finalize` makes the output durable and returns its
/// location; `abort` discards anything that is not a complete artifact on
/// its own (a partially written container) while leaving already-complete
/// loose files in place.
pub trait PageSink: Send {
    /// Writes one page's bytes under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on IO or container failures.
    fn write_page(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Completes the sink and returns the output location.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the output cannot be made durable.
    fn finalize(&mut self) -> Result<PathBuf, StorageError>;

    /// Discards partial output. Returns the location of any output that
    /// remains valid (complete loose files), or `None`.
    fn abort(&mut self) -> Option<PathBuf>;
}
