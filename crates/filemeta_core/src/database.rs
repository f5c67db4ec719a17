//! Store facade: one handle per location, one operation at a time.

use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::file_type::FileType;
use crate::guard::{LocationLease, StoreRegistry};
use crate::record::FileRecord;
use crate::status::Status;
use crate::store::{RecordPrefix, RecordStore, StoredRecord, VerifyReport};
use filemeta_storage::{
    CompactionStats, EngineOptions, InMemoryBackend, KvEngine, StorageBackend,
};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The main store handle.
///
/// Every public method holds the handle's mutex for its whole duration,
/// reads included, so a read never observes the gap between the delete and
/// the insert of another caller's upsert. Only one `FileDb` may be open per
/// location: a second open fails with [`CoreError::StoreLocked`] until the
/// first is closed or dropped.
///
/// ```rust,ignore
/// use filemeta_core::{FileDb, FileRecord, Status, StoredRecord};
///
/// let db = FileDb::open(Path::new("meta"))?;
/// let record = FileRecord::new(id, "/u/alice/text/notes.txt", Status::Received);
/// let mut stored = db.upsert(StoredRecord::new(record))?;
///
/// stored.status = Status::Approved;
/// db.upsert(stored)?;
/// db.close()?;
/// ```
pub struct FileDb {
    config: StoreConfig,
    /// None for in-memory stores.
    path: Option<PathBuf>,
    inner: Mutex<Option<OpenStore>>,
}

/// Fields drop in order: the engine closes before the directory lock and
/// the registry lease are released.
struct OpenStore {
    store: RecordStore,
    dir: Option<StoreDir>,
    _lease: Option<LocationLease>,
}

impl FileDb {
    /// Opens the store at `path` with default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreLocked` if the location is open elsewhere,
    /// `InvalidFormat` if it is missing and may not be created, or any I/O
    /// or log replay error.
    pub fn open_with_config(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        if config.create_if_missing {
            fs::create_dir_all(path)?;
        }
        let lease = StoreRegistry::acquire(path)?;
        let dir = StoreDir::open(path, config.create_if_missing)?;

        let backend = dir.open_log()?;
        let engine = KvEngine::open(
            Box::new(backend),
            EngineOptions {
                sync_on_commit: config.sync_on_commit,
            },
        )?;
        let store = RecordStore::new(engine, &config);
        info!(path = %path.display(), records = store.count(), "store opened");

        Ok(Self {
            config,
            path: Some(dir.path().to_path_buf()),
            inner: Mutex::new(Some(OpenStore {
                store,
                dir: Some(dir),
                _lease: Some(lease),
            })),
        })
    }

    /// Opens an empty store held in memory.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::open_in_memory_with_config(StoreConfig::default())
    }

    /// Opens an empty in-memory store with custom configuration.
    #[must_use]
    pub fn open_in_memory_with_config(config: StoreConfig) -> Self {
        let store = RecordStore::in_memory(&config);
        Self {
            config,
            path: None,
            inner: Mutex::new(Some(OpenStore {
                store,
                dir: None,
                _lease: None,
            })),
        }
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// Use this to make a multi-step sequence atomic with respect to other
    /// callers of this handle.
    pub fn with_store<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&RecordStore) -> CoreResult<T>,
    {
        let inner = self.inner.lock();
        let open = inner.as_ref().ok_or(CoreError::StoreClosed)?;
        f(&open.store)
    }

    /// See [`RecordStore::upsert`].
    pub fn upsert(&self, entry: StoredRecord) -> CoreResult<StoredRecord> {
        self.with_store(|s| s.upsert(entry))
    }

    /// Stores a record that has not been stored before.
    pub fn insert(&self, record: FileRecord) -> CoreResult<StoredRecord> {
        self.upsert(StoredRecord::new(record))
    }

    /// See [`RecordStore::remove_by_prefix`].
    pub fn remove_by_prefix(&self, prefix: &RecordPrefix) -> CoreResult<usize> {
        self.with_store(|s| s.remove_by_prefix(prefix))
    }

    /// Removes every record whose id starts with `id`, under any status.
    pub fn remove(&self, id: &str) -> CoreResult<usize> {
        self.remove_by_prefix(&RecordPrefix::id(id))
    }

    /// See [`RecordStore::find_first`].
    pub fn find_first(&self, prefix: &RecordPrefix) -> CoreResult<Option<StoredRecord>> {
        self.with_store(|s| s.find_first(prefix))
    }

    /// First record whose id starts with `id`, under any status.
    pub fn find(&self, id: &str) -> CoreResult<Option<StoredRecord>> {
        self.find_first(&RecordPrefix::id(id))
    }

    /// See [`RecordStore::scan_all`].
    pub fn scan_all<P>(&self, predicate: P) -> CoreResult<Vec<StoredRecord>>
    where
        P: FnMut(&FileRecord) -> bool,
    {
        self.with_store(|s| s.scan_all(predicate))
    }

    /// See [`RecordStore::scan_prefix`].
    pub fn scan_prefix(&self, prefix: &RecordPrefix) -> CoreResult<Vec<StoredRecord>> {
        self.with_store(|s| s.scan_prefix(prefix))
    }

    /// See [`RecordStore::scan_status`].
    pub fn scan_status(&self, status: Status) -> CoreResult<Vec<StoredRecord>> {
        self.with_store(|s| s.scan_status(status))
    }

    /// See [`RecordStore::exists`].
    pub fn exists(&self, id: &str) -> CoreResult<bool> {
        self.with_store(|s| s.exists(id))
    }

    /// See [`RecordStore::search`].
    pub fn search(
        &self,
        file_type: Option<FileType>,
        groups: &[&str],
    ) -> CoreResult<Vec<StoredRecord>> {
        self.with_store(|s| s.search(file_type, groups))
    }

    /// See [`RecordStore::set_status`].
    pub fn set_status(&self, id: &str, status: Status) -> CoreResult<StoredRecord> {
        self.with_store(|s| s.set_status(id, status))
    }

    /// See [`RecordStore::set_note`].
    pub fn set_note(&self, id: &str, note: &str) -> CoreResult<StoredRecord> {
        self.with_store(|s| s.set_note(id, note))
    }

    /// See [`RecordStore::set_group`].
    pub fn set_group(
        &self,
        id: &str,
        index: usize,
        name: &str,
    ) -> CoreResult<(StoredRecord, String)> {
        self.with_store(|s| s.set_group(id, index, name))
    }

    /// See [`RecordStore::add_ref`].
    pub fn add_ref(&self, id: &str, code: &str) -> CoreResult<StoredRecord> {
        self.with_store(|s| s.add_ref(id, code))
    }

    /// See [`RecordStore::remove_ref`].
    pub fn remove_ref(&self, id: &str, code: &str) -> CoreResult<StoredRecord> {
        self.with_store(|s| s.remove_ref(id, code))
    }

    /// Number of stored records.
    pub fn count(&self) -> CoreResult<usize> {
        self.with_store(|s| Ok(s.count()))
    }

    /// See [`RecordStore::status_counts`].
    pub fn status_counts(&self) -> CoreResult<Vec<(Status, usize)>> {
        self.with_store(RecordStore::status_counts)
    }

    /// See [`RecordStore::verify`].
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        self.with_store(RecordStore::verify)
    }

    /// Size of the record log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.with_store(RecordStore::log_size)
    }

    /// Rewrites the record log so it holds only live records.
    ///
    /// On disk the new log is written beside the old one and renamed over
    /// it.
    pub fn compact(&self) -> CoreResult<CompactionStats> {
        let inner = self.inner.lock();
        let open = inner.as_ref().ok_or(CoreError::StoreClosed)?;
        let stats = match &open.dir {
            Some(dir) => open.store.compact_with(|bytes| dir.replace_log(bytes))?,
            None => open.store.compact_with(|bytes| {
                let backend: Box<dyn StorageBackend> =
                    Box::new(InMemoryBackend::with_data(bytes.to_vec()));
                Ok(backend)
            })?,
        };
        info!(
            entries = stats.entries,
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            "store compacted"
        );
        Ok(stats)
    }

    /// Closes the store and releases its location. Closing twice is a
    /// no-op; every other call after close fails with `StoreClosed`.
    pub fn close(&self) -> CoreResult<()> {
        let Some(open) = self.inner.lock().take() else {
            return Ok(());
        };
        open.store.close()?;
        info!(path = ?self.path, "store closed");
        Ok(())
    }

    /// Whether [`close`](Self::close) has not been called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Directory of an on-disk store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Drop for FileDb {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close store on drop");
        }
    }
}

impl std::fmt::Debug for FileDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDb")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}
