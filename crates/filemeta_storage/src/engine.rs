//! Ordered key-value engine.
//!
//! The engine keeps the live key space in an ordered map and makes it
//! durable through an append-only log of commit batches (see
//! [`crate::batch`]). Readers get snapshot isolation by holding an `Arc` of
//! the map as it was when their transaction began; writers are serialized
//! by a single mutex and publish their changes only after the batch is in
//! the log.

use crate::backend::StorageBackend;
use crate::batch::{scan_log, Batch, Op};
use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryBackend;
use parking_lot::{Mutex, RwLock};
use std::collections::btree_map::Range;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// Options for opening an engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Whether every commit is fsynced before it becomes visible.
    pub sync_on_commit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
        }
    }
}

/// Statistics reported by [`KvEngine::compact_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionStats {
    /// Live entries written to the new log.
    pub entries: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

/// An embedded ordered key-value store.
pub struct KvEngine {
    state: RwLock<Arc<Tree>>,
    /// `None` once the engine is closed.
    log: Mutex<Option<Box<dyn StorageBackend>>>,
    write_lock: Mutex<()>,
    options: EngineOptions,
}

impl KvEngine {
    /// Opens an engine over `backend`, replaying every batch in its log.
    ///
    /// A damaged tail (torn write, bad checksum) stops the replay; the tail
    /// is cut off so later appends start from the last clean batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or truncated.
    pub fn open(mut backend: Box<dyn StorageBackend>, options: EngineOptions) -> StorageResult<Self> {
        let data = backend.read_all()?;
        let scan = scan_log(&data);

        if let Some(err) = &scan.tail_error {
            warn!(
                valid_len = scan.valid_len,
                log_len = data.len(),
                error = %err,
                "discarding damaged log tail"
            );
            backend.truncate(scan.valid_len)?;
        }

        let batch_count = scan.batches.len();
        let mut tree = Tree::new();
        for batch in scan.batches {
            apply(&mut tree, batch.into_ops());
        }
        info!(entries = tree.len(), batches = batch_count, "key-value engine opened");

        Ok(Self {
            state: RwLock::new(Arc::new(tree)),
            log: Mutex::new(Some(backend)),
            write_lock: Mutex::new(()),
            options,
        })
    }

    /// Creates an empty engine backed by memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(Arc::new(Tree::new())),
            log: Mutex::new(Some(Box::new(InMemoryBackend::new()))),
            write_lock: Mutex::new(()),
            options: EngineOptions {
                sync_on_commit: false,
            },
        }
    }

    /// Runs `f` against a consistent snapshot of the store.
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTxn) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.ensure_open()?;
        let txn = ReadTxn {
            snapshot: Arc::clone(&self.state.read()),
        };
        f(&txn)
    }

    /// Runs `f` in a write transaction and commits it if `f` succeeds.
    ///
    /// Only one write transaction runs at a time. If `f` returns an error
    /// nothing is written; if the log append fails the store is unchanged.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteTxn) -> Result<T, E>,
        E: From<StorageError>,
    {
        let _writer = self.write_lock.lock();
        self.ensure_open()?;

        let mut txn = WriteTxn {
            base: Arc::clone(&self.state.read()),
            pending: BTreeMap::new(),
        };
        let out = f(&mut txn)?;
        self.commit(txn)?;
        Ok(out)
    }

    fn commit(&self, txn: WriteTxn) -> StorageResult<()> {
        if txn.pending.is_empty() {
            return Ok(());
        }
        let batch = txn.into_batch();
        let bytes = batch.encode()?;

        {
            let mut log = self.log.lock();
            let backend = log.as_mut().ok_or(StorageError::Closed)?;
            let start = backend.size()?;
            let written = backend.append(&bytes).and_then(|_| {
                if self.options.sync_on_commit {
                    backend.sync()
                } else {
                    backend.flush()
                }
            });
            if let Err(err) = written {
                // Leave no partial batch behind for the next append to follow.
                if let Err(undo) = backend.truncate(start) {
                    warn!(error = %undo, "failed to roll back partial batch");
                }
                return Err(err);
            }
        }

        debug!(ops = batch.len(), bytes = bytes.len(), "batch committed");
        let mut state = self.state.write();
        apply(Arc::make_mut(&mut state), batch.into_ops());
        Ok(())
    }

    /// Rewrites the log so it holds only the live entries.
    ///
    /// `install` receives the encoded replacement log, must persist it, and
    /// returns the backend the engine should append to from now on. Writers
    /// are blocked for the duration.
    pub fn compact_with<F>(&self, install: F) -> StorageResult<CompactionStats>
    where
        F: FnOnce(&[u8]) -> StorageResult<Box<dyn StorageBackend>>,
    {
        let _writer = self.write_lock.lock();
        let mut log = self.log.lock();
        let bytes_before = log.as_ref().ok_or(StorageError::Closed)?.size()?;

        let snapshot = Arc::clone(&self.state.read());
        let mut batch = Batch::new();
        for (key, value) in snapshot.iter() {
            batch.set(key.clone(), value.clone());
        }
        let bytes = if batch.is_empty() {
            Vec::new()
        } else {
            batch.encode()?
        };

        let backend = install(&bytes)?;
        let bytes_after = backend.size()?;
        *log = Some(backend);

        info!(entries = snapshot.len(), bytes_before, bytes_after, "log compacted");
        Ok(CompactionStats {
            entries: snapshot.len(),
            bytes_before,
            bytes_after,
        })
    }

    /// Syncs and releases the log. Later operations fail with `Closed`.
    pub fn close(&self) -> StorageResult<()> {
        let _writer = self.write_lock.lock();
        if let Some(mut backend) = self.log.lock().take() {
            backend.sync()?;
        }
        Ok(())
    }

    /// Whether [`close`](Self::close) has not been called yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.log.lock().is_some()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Current size of the log in bytes.
    pub fn log_size(&self) -> StorageResult<u64> {
        self.log.lock().as_ref().ok_or(StorageError::Closed)?.size()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.log.lock().is_none() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for KvEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvEngine")
            .field("entries", &self.len())
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish()
    }
}

fn apply(tree: &mut Tree, ops: Vec<Op>) {
    for op in ops {
        match op {
            Op::Set { key, value } => {
                tree.insert(key, value);
            }
            Op::Delete { key } => {
                tree.remove(&key);
            }
        }
    }
}

/// A read-only, snapshot-isolated view of the store.
#[derive(Debug)]
pub struct ReadTxn {
    snapshot: Arc<Tree>,
}

impl ReadTxn {
    /// Returns the value stored at `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.snapshot.get(key).map(Vec::as_slice)
    }

    /// Opens an unpositioned cursor; call `seek` or `rewind` first.
    #[must_use]
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.snapshot)
    }

    /// Number of entries visible to this transaction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Whether the snapshot holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }
}

/// An ordered cursor over a snapshot.
///
/// Mirrors the usual embedded-store iterator protocol: `seek(prefix)` then
/// loop while `valid_for_prefix(prefix)`, or `rewind()` then loop while
/// `valid()`, calling `next()` after each item.
pub struct Cursor<'a> {
    tree: &'a Tree,
    range: Range<'a, Vec<u8>, Vec<u8>>,
    current: Option<(&'a Vec<u8>, &'a Vec<u8>)>,
}

impl<'a> Cursor<'a> {
    fn new(tree: &'a Tree) -> Self {
        Self {
            tree,
            range: tree.range::<[u8], _>(..),
            current: None,
        }
    }

    /// Positions the cursor on the first key not less than `prefix`.
    pub fn seek(&mut self, prefix: &[u8]) {
        self.range = self
            .tree
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded));
        self.current = self.range.next();
    }

    /// Positions the cursor on the first key of the store.
    pub fn rewind(&mut self) {
        self.range = self.tree.range::<[u8], _>(..);
        self.current = self.range.next();
    }

    /// Whether the cursor points at an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Whether the cursor points at an entry whose key starts with `prefix`.
    #[must_use]
    pub fn valid_for_prefix(&self, prefix: &[u8]) -> bool {
        self.current
            .is_some_and(|(key, _)| key.starts_with(prefix))
    }

    /// Advances to the next entry in key order.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        self.current = self.range.next();
    }

    /// Key at the cursor.
    #[must_use]
    pub fn key(&self) -> Option<&'a [u8]> {
        self.current.map(|(key, _)| key.as_slice())
    }

    /// Value at the cursor.
    #[must_use]
    pub fn value(&self) -> Option<&'a [u8]> {
        self.current.map(|(_, value)| value.as_slice())
    }
}

/// A write transaction. Changes are buffered until the engine commits.
#[derive(Debug)]
pub struct WriteTxn {
    base: Arc<Tree>,
    /// `None` marks a delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteTxn {
    /// Returns the value at `key`, including this transaction's own writes.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        match self.pending.get(key) {
            Some(pending) => pending.as_deref(),
            None => self.base.get(key).map(Vec::as_slice),
        }
    }

    /// Inserts or overwrites `key`.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.pending.insert(key.into(), Some(value.into()));
    }

    /// Deletes `key`. Deleting a missing key is not an error.
    pub fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }

    /// Returns every visible key starting with `prefix`, in key order.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut keys: BTreeSet<Vec<u8>> = self
            .base
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for (key, pending) in self
            .pending
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            if pending.is_some() {
                keys.insert(key.clone());
            } else {
                keys.remove(key);
            }
        }
        keys.into_iter().collect()
    }

    /// Number of keys this transaction will touch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn into_batch(self) -> Batch {
        let mut batch = Batch::new();
        for (key, pending) in self.pending {
            match pending {
                Some(value) => batch.set(key, value),
                None => batch.delete(key),
            }
        }
        batch
    }
}
