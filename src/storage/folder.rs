//! Loose-file sink for the flat and per-chapter-directory layouts.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::{PageSink, StorageError};

/// Writes each page as its own file under a directory.
///
/// Every committed file is complete on its own, so `abort` keeps what was
/// already written.
#[derive(Debug)]
pub struct FolderSink {
    directory: PathBuf,
    created: bool,
}

impl FolderSink {
    /// Creates a sink rooted at `directory`. The directory itself is created
    /// lazily on the first write, so an all-failed chapter leaves nothing
    /// behind.
    #[must_use]
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            created: false,
        }
    }

    fn ensure_directory(&mut self) -> Result<(), StorageError> {
        if !self.created {
            fs::create_dir_all(&self.directory)
                .map_err(|e| StorageError::io(&self.directory, e))?;
            self.created = true;
        }
        Ok(())
    }
}

impl PageSink for FolderSink {
    fn write_page(&mut self, file_name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.ensure_directory()?;
        let path = self.directory.join(file_name);
        fs::write(&path, bytes).map_err(|e| StorageError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote page file");
        Ok(())
    }

    fn finalize(&mut self) -> Result<PathBuf, StorageError> {
        Ok(self.directory.clone())
    }

    fn abort(&mut self) -> Option<PathBuf> {
        // Loose files already written are complete artifacts; keep them.
        self.created.then(|| self.directory.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let mut sink = FolderSink::new(target.clone());

        sink.write_page("01_00.jpg", b"first").unwrap();
        sink.write_page("01_01.jpg", b"second").unwrap();
        let location = sink.finalize().unwrap();

        assert_eq!(location, target);
        assert_eq!(fs::read(target.join("01_00.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(target.join("01_01.jpg")).unwrap(), b"second");
    }

    #[test]
    fn test_folder_sink_no_directory_until_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let mut sink = FolderSink::new(target.clone());

        assert!(!target.exists());
        assert!(sink.abort().is_none());
        assert!(!target.exists());
    }

    #[test]
    fn test_folder_sink_abort_keeps_complete_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let mut sink = FolderSink::new(target.clone());

        sink.write_page("00.jpg", b"kept").unwrap();
        let location = sink.abort();

        assert_eq!(location, Some(target.clone()));
        assert_eq!(fs::read(target.join("00.jpg")).unwrap(), b"kept");
    }
}
