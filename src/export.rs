//! Metadata export: chapter titles, author notes, and the series summary.
//!
//! Runs independently of page download outcomes — a chapter whose pages all
//! failed still gets its metadata exported, as long as its descriptor was
//! obtained. Plain-text export writes one artifact per chapter as data
//! arrives; JSON export accumulates everything and writes one aggregate
//! `info.json` at the end of the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::ChapterDescriptor;
use crate::storage::naming::chapter_label;

/// Which artifacts the exporter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Per-chapter text files plus `summary.txt`.
    Text,

    /// One aggregate `info.json`.
    Json,

    /// Both.
    All,
}

impl ExportFormat {
    fn writes_text(self) -> bool {
        matches!(self, Self::Text | Self::All)
    }

    fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::All)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "all" => Ok(Self::All),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Errors from metadata export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File system error with path context.
    #[error("IO error writing {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The aggregate document could not be serialized.
    #[error("failed to serialize export data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExportError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Accumulated export state for the aggregate document.
#[derive(Debug, Default, Serialize)]
struct ExportData {
    summary: String,
    chapters: BTreeMap<u32, ChapterEntry>,
}

#[derive(Debug, Serialize)]
struct ChapterEntry {
    title: String,
    notes: String,
}

/// Writes chapter metadata in the configured format(s).
///
/// Shared by all chapter workers; the accumulated state is behind a mutex
/// that is never held across an await.
#[derive(Debug)]
pub struct MetadataExporter {
    format: ExportFormat,
    dest: PathBuf,
    data: Mutex<ExportData>,
}

impl MetadataExporter {
    /// Creates an exporter writing under `dest`.
    #[must_use]
    pub fn new(format: ExportFormat, dest: PathBuf) -> Self {
        Self {
            format,
            dest,
            data: Mutex::new(ExportData::default()),
        }
    }

    /// Records the series summary; in text mode writes `summary.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] when the summary file cannot be written.
    pub async fn add_series_summary(&self, summary: &str) -> Result<(), ExportError> {
        if summary.is_empty() {
            return Ok(());
        }

        if let Ok(mut data) = self.data.lock() {
            data.summary = summary.to_string();
        }

        if self.format.writes_text() {
            self.write_file(&self.dest.join("summary.txt"), summary).await?;
        }
        Ok(())
    }

    /// Records one chapter's title and notes; in text mode writes
    /// `{chapter}_title.txt` and (when notes exist) `{chapter}_notes.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] when a chapter file cannot be written.
    pub async fn add_chapter(
        &self,
        chapter: &ChapterDescriptor,
        chapter_pad: usize,
    ) -> Result<(), ExportError> {
        let notes = chapter.author_notes.clone().unwrap_or_default();

        if let Ok(mut data) = self.data.lock() {
            data.chapters.insert(
                chapter.chapter_number,
                ChapterEntry {
                    title: chapter.title.clone(),
                    notes: notes.clone(),
                },
            );
        }

        if !self.format.writes_text() {
            return Ok(());
        }

        let label = chapter_label(chapter.chapter_number, chapter_pad);
        self.write_file(&self.dest.join(format!("{label}_title.txt")), &chapter.title)
            .await?;

        if !notes.is_empty() {
            self.write_file(&self.dest.join(format!("{label}_notes.txt")), &notes)
                .await?;
        }

        debug!(chapter = chapter.chapter_number, "exported chapter metadata");
        Ok(())
    }

    /// Writes the aggregate `info.json` when the format asks for it.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on serialization or IO failure.
    pub async fn write_aggregate(&self) -> Result<(), ExportError> {
        if !self.format.writes_json() {
            return Ok(());
        }

        let json = {
            let data = self
                .data
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            serde_json::to_string_pretty(&*data)?
        };

        let path = self.dest.join("info.json");
        self.write_file(&path, &json).await?;
        debug!(path = %path.display(), "wrote aggregate metadata");
        Ok(())
    }

    async fn write_file(&self, path: &Path, contents: &str) -> Result<(), ExportError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExportError::io(parent, e))?;
        }
        let mut body = contents.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| ExportError::io(path, e))
    }
}
