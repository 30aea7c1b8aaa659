//! Archive sink: one zip/cbz container per chapter.
//!
//! The container is written to `<name>.part` and renamed into place on
//! finalization. A chapter that is cancelled or fails before finalization
//! leaves no partial container behind.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::{PageSink, StorageError};

/// Suffix for in-progress containers.
const PART_SUFFIX: &str = "part";

/// Sequential zip writer for one chapter's pages.
pub struct ZipSink {
    final_path: PathBuf,
    part_path: PathBuf,
    writer: Option<ZipWriter<File>>,
}

impl std::fmt::Debug for ZipSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSink")
            .field("final_path", &self.final_path)
            .field("open", &self.writer.is_some())
            .finish()
    }
}

impl ZipSink {
    /// Creates a sink that will produce `final_path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the parent directory or the `.part`
    /// file cannot be created.
    pub fn new(final_path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let part_path = part_path_for(&final_path);
        let file = File::create(&part_path).map_err(|e| StorageError::io(&part_path, e))?;

        Ok(Self {
            final_path,
            part_path,
            writer: Some(ZipWriter::new(file)),
        })
    }
}

impl PageSink for ZipSink {
    fn write_page(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(StorageError::io(
                &self.part_path,
                std::io::Error::other("archive already finalized"),
            ));
        };

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        writer
            .start_file(file_name, options)
            .map_err(|e| StorageError::archive(&self.part_path, e))?;
        writer
            .write_all(bytes)
            .map_err(|e| StorageError::io(&self.part_path, e))?;

        debug!(entry = file_name, bytes = bytes.len(), "added archive entry");
        Ok(())
    }

    fn finalize(&mut self) -> Result<PathBuf, StorageError> {
        let Some(writer) = self.writer.take() else {
            return Ok(self.final_path.clone());
        };

        writer
            .finish()
            .map_err(|e| StorageError::archive(&self.part_path, e))?;
        fs::rename(&self.part_path, &self.final_path)
            .map_err(|e| StorageError::io(&self.final_path, e))?;

        debug!(path = %self.final_path.display(), "finalized archive");
        Ok(self.final_path.clone())
    }

    fn abort(&mut self) -> Option<PathBuf> {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.part_path) {
                warn!(
                    path = %self.part_path.display(),
                    error = %e,
                    "failed to remove partial archive"
                );
            }
        }
        None
    }
}

impl Drop for ZipSink {
    fn drop(&mut self) {
        // A sink dropped without finalize is an abort.
        if self.writer.is_some() {
            self.abort();
        }
    }
}

/// Returns `dir/name.ext.part` for `dir/name.ext`.
fn part_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(".");
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Read;

    use super::*;

    fn entry_names(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_zip_sink_writes_entries_in_call_order() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.cbz");
        let mut sink = ZipSink::new(target.clone()).unwrap();

        sink.write_page("00.jpg", b"page zero").unwrap();
        sink.write_page("01.jpg", b"page one").unwrap();
        let location = sink.finalize().unwrap();

        assert_eq!(location, target);
        assert!(target.exists());
        assert_eq!(entry_names(&target), vec!["00.jpg", "01.jpg"]);
    }

    #[test]
    fn test_zip_sink_roundtrips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.zip");
        let mut sink = ZipSink::new(target.clone()).unwrap();

        sink.write_page("00.png", b"\x89PNG-ish bytes").unwrap();
        sink.finalize().unwrap();

        let file = File::open(&target).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name("00.png").unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"\x89PNG-ish bytes");
    }

    #[test]
    fn test_zip_sink_part_file_hidden_until_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.zip");
        let mut sink = ZipSink::new(target.clone()).unwrap();

        sink.write_page("00.jpg", b"bytes").unwrap();
        assert!(!target.exists(), "final path must not exist before finalize");
        assert!(dir.path().join("001.zip.part").exists());

        sink.finalize().unwrap();
        assert!(target.exists());
        assert!(!dir.path().join("001.zip.part").exists());
    }

    #[test]
    fn test_zip_sink_abort_removes_partial_container() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.zip");
        let mut sink = ZipSink::new(target.clone()).unwrap();

        sink.write_page("00.jpg", b"bytes").unwrap();
        assert!(sink.abort().is_none());

        assert!(!target.exists());
        assert!(!dir.path().join("001.zip.part").exists());
    }

    #[test]
    fn test_zip_sink_drop_without_finalize_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("001.zip");
        {
            let mut sink = ZipSink::new(target.clone()).unwrap();
            sink.write_page("00.jpg", b"bytes").unwrap();
        }
        assert!(!target.exists());
        assert!(!dir.path().join("001.zip.part").exists());
    }
}
