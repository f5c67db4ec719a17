//! Store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-owner access
//! └─ records.log       # Commit log of the key-value engine
//! ```
//!
//! The LOCK file keeps a second process from opening the same store.

use crate::error::{CoreError, CoreResult};
use filemeta_storage::{FileBackend, StorageBackend, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "records.log";
const LOG_TEMP: &str = "records.log.tmp";

/// Holds the exclusive lock on a store directory.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    /// Lock file handle. The lock is released when it closes.
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::locked(path));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the record log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Opens the record log for appending.
    pub fn open_log(&self) -> CoreResult<FileBackend> {
        Ok(FileBackend::open(&self.log_path())?)
    }

    /// Replaces the record log with `contents` and opens the new file.
    ///
    /// Writes a temporary file, syncs it, renames it over the log, then
    /// fsyncs the directory so the rename survives a crash. On Windows the
    /// rename fails while the old log is still open.
    pub fn replace_log(&self, contents: &[u8]) -> StorageResult<Box<dyn StorageBackend>> {
        let temp_path = self.path.join(LOG_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.log_path())?;
        self.sync_directory()?;

        let backend: Box<dyn StorageBackend> = Box::new(FileBackend::open(&self.log_path())?);
        Ok(backend)
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> std::io::Result<()> {
        File::open(&self.path)?.sync_all()
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        let dir = StoreDir::open(&store_path, true).unwrap();
        assert!(store_path.is_dir());
        assert_eq!(dir.log_path(), store_path.join("records.log"));
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("missing"), false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _dir = StoreDir::open(temp.path(), true).unwrap();
        let result = StoreDir::open(temp.path(), true);
        assert!(matches!(result, Err(CoreError::StoreLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(StoreDir::open(temp.path(), true).unwrap());
        let _again = StoreDir::open(temp.path(), true).unwrap();
    }

    #[test]
    fn replace_log_swaps_contents() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true).unwrap();
        let mut old = dir.open_log().unwrap();
        old.append(b"old contents").unwrap();

        let new = dir.replace_log(b"new").unwrap();
        assert_eq!(new.size().unwrap(), 3);
        assert_eq!(fs::read(dir.log_path()).unwrap(), b"new");
        assert!(!temp.path().join(LOG_TEMP).exists());
    }
}
