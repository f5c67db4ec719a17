//! The composite-key record store.
//!
//! Every record lives at a key derived from its status, id and path (see
//! [`crate::record`]). Prefix scans over that key stand in for secondary
//! indexes, and an update whose key fields changed is a move: the entry at
//! the previous key is deleted and the new one inserted in the same write
//! transaction.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::file_type::FileType;
use crate::fingerprint::normalize_id;
use crate::record::FileRecord;
use crate::status::Status;
use filemeta_codec::{CodecError, FieldCodec, KeyPrefix};
use filemeta_storage::{CompactionStats, KvEngine, ReadTxn, StorageBackend, StorageResult};
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// A record together with the key it occupied when it was read or last
/// written.
///
/// The previous key is private: it is captured by the store and handed back
/// to [`RecordStore::upsert`], so mutating the record in between can never
/// lose track of the entry it has to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    record: FileRecord,
    prev_key: Option<Vec<u8>>,
}

impl StoredRecord {
    /// Wraps a record that has never been stored.
    #[must_use]
    pub fn new(record: FileRecord) -> Self {
        Self {
            record,
            prev_key: None,
        }
    }

    fn loaded(record: FileRecord, key: Vec<u8>) -> Self {
        Self {
            record,
            prev_key: Some(key),
        }
    }

    /// The record.
    #[must_use]
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    /// Mutable access to the record. The previous key is unaffected.
    pub fn record_mut(&mut self) -> &mut FileRecord {
        &mut self.record
    }

    /// Unwraps the record, forgetting where it was stored.
    #[must_use]
    pub fn into_record(self) -> FileRecord {
        self.record
    }

    /// Key the record occupied when it was loaded, `None` for new records.
    #[must_use]
    pub fn previous_key(&self) -> Option<&[u8]> {
        self.prev_key.as_deref()
    }
}

impl Deref for StoredRecord {
    type Target = FileRecord;

    fn deref(&self) -> &FileRecord {
        &self.record
    }
}

impl DerefMut for StoredRecord {
    fn deref_mut(&mut self) -> &mut FileRecord {
        &mut self.record
    }
}

impl From<FileRecord> for StoredRecord {
    fn from(record: FileRecord) -> Self {
        Self::new(record)
    }
}

/// Leading key fields that select a range of records.
///
/// The id is matched as a prefix in every variant, and the path too in
/// [`RecordPrefix::StatusIdPath`]. Ids are lower-cased before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPrefix {
    /// Any status; tried in [`Status::ALL`] order.
    Id(String),
    /// One status.
    StatusId(Status, String),
    /// One status and a complete id, then a path prefix.
    StatusIdPath(Status, String, String),
}

impl RecordPrefix {
    /// Matches `id` under any status.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// The id component.
    #[must_use]
    pub fn id_part(&self) -> &str {
        match self {
            Self::Id(id) | Self::StatusId(_, id) | Self::StatusIdPath(_, id, _) => id,
        }
    }

    fn key_prefixes(&self) -> CoreResult<Vec<KeyPrefix>> {
        let id = normalize_id(self.id_part());
        let prefixes = match self {
            Self::Id(_) => Status::ALL
                .iter()
                .map(|s| KeyPrefix::new(&[s.as_str().as_bytes()], Some(id.as_bytes())))
                .collect::<Result<Vec<_>, CodecError>>()?,
            Self::StatusId(status, _) => vec![KeyPrefix::new(
                &[status.as_str().as_bytes()],
                Some(id.as_bytes()),
            )?],
            Self::StatusIdPath(status, _, path) => vec![KeyPrefix::new(
                &[status.as_str().as_bytes(), id.as_bytes()],
                Some(path.as_bytes()),
            )?],
        };
        Ok(prefixes)
    }
}

/// A key that failed to decode, reported by [`RecordStore::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// The raw key.
    pub key: Vec<u8>,
    /// Why it failed.
    pub error: CodecError,
}

/// Outcome of [`RecordStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries that decoded cleanly.
    pub records: usize,
    /// Entries that did not.
    pub failures: Vec<DecodeFailure>,
}

impl VerifyReport {
    /// Whether every entry decoded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// File records over an ordered key-value engine.
///
/// `RecordStore` does no locking of its own beyond the engine's single
/// writer; wrap it in [`crate::FileDb`] to serialize whole operations.
#[derive(Debug)]
pub struct RecordStore {
    engine: KvEngine,
    min_id_prefix_len: usize,
}

impl RecordStore {
    /// Wraps an open engine.
    #[must_use]
    pub fn new(engine: KvEngine, config: &StoreConfig) -> Self {
        Self {
            engine,
            min_id_prefix_len: config.min_id_prefix_len,
        }
    }

    /// An empty store held in memory.
    #[must_use]
    pub fn in_memory(config: &StoreConfig) -> Self {
        Self::new(KvEngine::in_memory(), config)
    }

    /// Writes `entry`, replacing the entry at its previous key.
    ///
    /// Returns a snapshot whose previous key is the key just written, ready
    /// for the next read-mutate-upsert cycle. Writing an unchanged record
    /// leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the record fails validation, or any
    /// engine error. On error nothing is written.
    pub fn upsert(&self, entry: StoredRecord) -> CoreResult<StoredRecord> {
        entry.record.validate()?;
        let (key, value) = FieldCodec::encode(&entry.record)?;

        let moved = self.engine.update(|txn| -> CoreResult<bool> {
            let mut moved = false;
            if let Some(prev) = entry.prev_key.as_deref() {
                if prev != key.as_slice() {
                    txn.delete(prev);
                    moved = true;
                }
            }
            if txn.get(&key) != Some(value.as_slice()) {
                txn.set(key.clone(), value);
            }
            Ok(moved)
        })?;

        debug!(
            key_len = key.len(),
            moved,
            id = %entry.record.id,
            "record upserted"
        );
        Ok(StoredRecord::loaded(entry.record, key))
    }

    /// Deletes every entry under `prefix` and returns how many there were.
    ///
    /// # Errors
    ///
    /// Returns `PrefixTooShort` without deleting anything if the id is
    /// shorter than the configured minimum.
    pub fn remove_by_prefix(&self, prefix: &RecordPrefix) -> CoreResult<usize> {
        self.check_prefix_len(prefix)?;
        let prefixes = prefix.key_prefixes()?;

        let removed = self.engine.update(|txn| -> CoreResult<usize> {
            let mut removed = 0;
            for p in &prefixes {
                for key in txn.keys_with_prefix(p.as_bytes()) {
                    txn.delete(&key);
                    removed += 1;
                }
            }
            Ok(removed)
        })?;

        debug!(removed, id = %prefix.id_part(), "records removed by prefix");
        Ok(removed)
    }

    fn check_prefix_len(&self, prefix: &RecordPrefix) -> CoreResult<()> {
        let len = normalize_id(prefix.id_part()).chars().count();
        if len < self.min_id_prefix_len {
            return Err(CoreError::PrefixTooShort {
                len,
                min: self.min_id_prefix_len,
            });
        }
        Ok(())
    }

    /// Returns the first record under `prefix`, or `None`.
    ///
    /// For [`RecordPrefix::Id`] each status is tried in [`Status::ALL`]
    /// order and the first hit wins.
    pub fn find_first(&self, prefix: &RecordPrefix) -> CoreResult<Option<StoredRecord>> {
        let prefixes = prefix.key_prefixes()?;
        let found = self.engine.view(|txn| -> CoreResult<_> {
            for p in &prefixes {
                let mut cursor = txn.cursor();
                cursor.seek(p.as_bytes());
                if !cursor.valid_for_prefix(p.as_bytes()) {
                    continue;
                }
                if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
                    return Ok(Some(load(key, value)?));
                }
            }
            Ok(None)
        })?;

        debug!(id = %prefix.id_part(), found = found.is_some(), "find first");
        Ok(found)
    }

    /// Returns every record under `prefix` in key order, one status after
    /// another for [`RecordPrefix::Id`].
    pub fn scan_prefix(&self, prefix: &RecordPrefix) -> CoreResult<Vec<StoredRecord>> {
        let prefixes = prefix.key_prefixes()?;
        self.engine.view(|txn| {
            let mut out = Vec::new();
            for p in &prefixes {
                collect_prefix(txn, p.as_bytes(), &mut out, |_| true)?;
            }
            Ok(out)
        })
    }

    /// Returns every record in `status`, in key order.
    pub fn scan_status(&self, status: Status) -> CoreResult<Vec<StoredRecord>> {
        let prefix = KeyPrefix::new(&[status.as_str().as_bytes()], None)?;
        self.engine.view(|txn| {
            let mut out = Vec::new();
            collect_prefix(txn, prefix.as_bytes(), &mut out, |_| true)?;
            Ok(out)
        })
    }

    /// Decodes every record and keeps those `predicate` accepts, in key
    /// order.
    pub fn scan_all<P>(&self, predicate: P) -> CoreResult<Vec<StoredRecord>>
    where
        P: FnMut(&FileRecord) -> bool,
    {
        self.engine.view(|txn| {
            let mut out = Vec::new();
            collect_prefix(txn, &[], &mut out, predicate)?;
            Ok(out)
        })
    }

    /// Whether a live record with this id exists. Deleted records do not
    /// count.
    pub fn exists(&self, id: &str) -> CoreResult<bool> {
        Ok(self
            .find_first(&RecordPrefix::id(id))?
            .is_some_and(|entry| entry.status != Status::Deleted))
    }

    /// Lists records of `file_type` (any type when `None`) whose groups
    /// start with `groups`.
    pub fn search(
        &self,
        file_type: Option<FileType>,
        groups: &[&str],
    ) -> CoreResult<Vec<StoredRecord>> {
        self.scan_all(|record| {
            file_type.is_none_or(|t| record.file_type() == Some(t))
                && record.groups.starts_with(groups)
        })
    }

    /// Loads the first record matching `id`, applies `change`, and writes
    /// it back.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if no record matches, or whatever `change`
    /// returns.
    pub fn modify<T, F>(&self, id: &str, change: F) -> CoreResult<(StoredRecord, T)>
    where
        F: FnOnce(&mut FileRecord) -> CoreResult<T>,
    {
        let mut entry = self
            .find_first(&RecordPrefix::id(id))?
            .ok_or_else(|| CoreError::not_found(id))?;
        let out = change(entry.record_mut())?;
        Ok((self.upsert(entry)?, out))
    }

    /// Moves the record to `status`.
    pub fn set_status(&self, id: &str, status: Status) -> CoreResult<StoredRecord> {
        self.modify(id, |r| {
            r.status = status;
            Ok(())
        })
        .map(|(entry, ())| entry)
    }

    /// Replaces the record's note.
    pub fn set_note(&self, id: &str, note: &str) -> CoreResult<StoredRecord> {
        self.modify(id, |r| {
            r.set_note(note);
            Ok(())
        })
        .map(|(entry, ())| entry)
    }

    /// Sets a group and moves the path. Returns the stored record and the
    /// path it had before, so the caller can move the file.
    pub fn set_group(
        &self,
        id: &str,
        index: usize,
        name: &str,
    ) -> CoreResult<(StoredRecord, String)> {
        self.modify(id, |r| r.set_group(index, name))
    }

    /// Adds a referrer.
    pub fn add_ref(&self, id: &str, code: &str) -> CoreResult<StoredRecord> {
        self.modify(id, |r| {
            r.add_ref(code);
            Ok(())
        })
        .map(|(entry, ())| entry)
    }

    /// Removes a referrer.
    pub fn remove_ref(&self, id: &str, code: &str) -> CoreResult<StoredRecord> {
        self.modify(id, |r| {
            r.remove_ref(code);
            Ok(())
        })
        .map(|(entry, ())| entry)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.engine.len()
    }

    /// Number of entries per status, in [`Status::ALL`] order.
    pub fn status_counts(&self) -> CoreResult<Vec<(Status, usize)>> {
        let prefixes = Status::ALL
            .iter()
            .map(|s| -> CoreResult<(Status, KeyPrefix)> {
                Ok((*s, KeyPrefix::new(&[s.as_str().as_bytes()], None)?))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        self.engine.view(|txn| {
            let counts = prefixes
                .iter()
                .map(|(status, p)| {
                    let mut cursor = txn.cursor();
                    cursor.seek(p.as_bytes());
                    let mut n = 0;
                    while cursor.valid_for_prefix(p.as_bytes()) {
                        n += 1;
                        cursor.next();
                    }
                    (*status, n)
                })
                .collect();
            Ok(counts)
        })
    }

    /// Decodes every entry and reports the ones that fail.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        self.engine.view(|txn| {
            let mut report = VerifyReport::default();
            let mut cursor = txn.cursor();
            cursor.rewind();
            while let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
                match FieldCodec::<FileRecord>::decode(key, value) {
                    Ok(_) => report.records += 1,
                    Err(error) => report.failures.push(DecodeFailure {
                        key: key.to_vec(),
                        error,
                    }),
                }
                cursor.next();
            }
            Ok(report)
        })
    }

    /// Size of the engine's log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        Ok(self.engine.log_size()?)
    }

    /// Rewrites the log with only live entries; see
    /// [`KvEngine::compact_with`].
    pub fn compact_with<F>(&self, install: F) -> CoreResult<CompactionStats>
    where
        F: FnOnce(&[u8]) -> StorageResult<Box<dyn StorageBackend>>,
    {
        Ok(self.engine.compact_with(install)?)
    }

    /// Closes the engine.
    pub fn close(&self) -> CoreResult<()> {
        Ok(self.engine.close()?)
    }
}

fn load(key: &[u8], value: &[u8]) -> CoreResult<StoredRecord> {
    let record = FieldCodec::<FileRecord>::decode(key, value)?;
    Ok(StoredRecord::loaded(record, key.to_vec()))
}

fn collect_prefix<P>(
    txn: &ReadTxn,
    prefix: &[u8],
    out: &mut Vec<StoredRecord>,
    mut predicate: P,
) -> CoreResult<()>
where
    P: FnMut(&FileRecord) -> bool,
{
    let mut cursor = txn.cursor();
    cursor.seek(prefix);
    while cursor.valid_for_prefix(prefix) {
        if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
            let entry = load(key, value)?;
            if predicate(&entry.record) {
                out.push(entry);
            }
        }
        cursor.next();
    }
    Ok(())
}
