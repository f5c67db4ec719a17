//! Temporary stores and sample records.

use filemeta_core::{FileDb, FileRecord, Status, StoreConfig};
use std::path::Path;
use tempfile::TempDir;

/// A store with automatic cleanup.
pub struct TestStore {
    /// The store handle.
    pub db: FileDb,
    /// Kept alive so the directory outlives the store.
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory store.
    pub fn memory() -> Self {
        Self {
            db: FileDb::open_in_memory(),
            temp_dir: None,
        }
    }

    /// Creates an on-disk store in a fresh temporary directory.
    pub fn file() -> Self {
        Self::file_with_config(StoreConfig::default().sync_on_commit(false))
    }

    /// Creates an on-disk store with custom configuration.
    pub fn file_with_config(config: StoreConfig) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db = FileDb::open_with_config(temp_dir.path(), config).expect("failed to open store");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Directory of an on-disk store.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the store and opens the same directory again.
    ///
    /// # Panics
    ///
    /// Panics for in-memory stores, or if the reopen fails.
    pub fn reopen(&mut self) {
        let path = self
            .path()
            .expect("in-memory stores cannot be reopened")
            .to_path_buf();
        let config = self.db.config().clone();
        self.db.close().expect("failed to close store");
        self.db = FileDb::open_with_config(&path, config).expect("failed to reopen store");
    }
}

impl std::ops::Deref for TestStore {
    type Target = FileDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs `f` against a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileDb) -> R,
{
    let store = TestStore::memory();
    f(&store.db)
}

/// Runs `f` against a temporary on-disk store and its directory.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileDb, &Path) -> R,
{
    let store = TestStore::file();
    let path = store.path().expect("file store has a path").to_path_buf();
    f(&store.db, &path)
}

/// A 32-character lower-case hex id derived from `n`.
pub fn sample_id(n: u64) -> String {
    format!("{n:032x}")
}

/// A received text record numbered `n`, owned by `alice`.
pub fn sample_record(n: u64) -> FileRecord {
    FileRecord::new(
        sample_id(n),
        format!("/u/alice/text/file-{n}.txt"),
        Status::Received,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_ids_meet_default_minimum() {
        assert_eq!(sample_id(7).len(), 32);
        assert!(sample_record(7).validate().is_ok());
    }

    #[test]
    fn reopen_keeps_records() {
        let mut store = TestStore::file();
        store.insert(sample_record(1)).unwrap();
        store.reopen();
        assert!(store.exists(&sample_id(1)).unwrap());
    }

    #[test]
    fn file_store_helper_gives_directory() {
        with_file_store(|db, path| {
            assert_eq!(db.path(), Some(path));
            assert!(path.join("records.log").exists());
        });
    }
}
