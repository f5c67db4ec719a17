//! Concurrent load against one store handle.

use crate::fixtures::{sample_id, sample_record};
use filemeta_core::{CoreResult, FileDb, RecordPrefix, Status, StoredRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Operations that returned `Ok`.
    pub successful_ops: usize,
    /// Operations that returned `Err`.
    pub failed_ops: usize,
    /// Wall time.
    pub duration: Duration,
}

impl StressResult {
    /// Total operations attempted.
    pub fn total_ops(&self) -> usize {
        self.successful_ops + self.failed_ops
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Worker threads.
    pub threads: usize,
    /// Operations per thread.
    pub ops_per_thread: usize,
    /// Distinct records touched.
    pub record_count: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            ops_per_thread: 200,
            record_count: 8,
        }
    }
}

/// Inserts `config.record_count` sample records.
pub fn populate(db: &FileDb, config: &StressConfig) -> CoreResult<()> {
    for n in 0..config.record_count {
        db.insert(sample_record(n))?;
    }
    Ok(())
}

/// Every thread cycles records through statuses with read-mutate-upsert
/// sequences run under [`FileDb::with_store`], while also reading.
pub fn stress_status_cycles(db: Arc<FileDb>, config: &StressConfig) -> StressResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let db = Arc::clone(&db);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.ops_per_thread {
                    let n = ((t * config.ops_per_thread + i) as u64) % config.record_count;
                    let id = sample_id(n);
                    let status = Status::ALL[(t + i) % (Status::ALL.len() - 1)];

                    let outcome = if i % 3 == 0 {
                        db.exists(&id).map(|_| ())
                    } else {
                        db.with_store(|store| {
                            let Some(mut entry) = store.find_first(&RecordPrefix::id(id.as_str()))?
                            else {
                                return Ok(());
                            };
                            entry.status = status;
                            entry.set_note(format!("thread {t} op {i}"));
                            store.upsert(entry).map(|_| ())
                        })
                    };

                    match outcome {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressResult {
        successful_ops: successful.load(Ordering::Relaxed),
        failed_ops: failed.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}

/// Same workload, but each step loads and upserts in separate calls, so
/// threads may upsert stale snapshots of one record.
pub fn stress_unguarded_cycles(db: Arc<FileDb>, config: &StressConfig) -> StressResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let db = Arc::clone(&db);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..config.ops_per_thread {
                    let n = ((t * config.ops_per_thread + i) as u64) % config.record_count;
                    let status = Status::ALL[(t + i) % (Status::ALL.len() - 1)];
                    let outcome = db.find(&sample_id(n)).and_then(|found| match found {
                        Some(mut entry) => {
                            entry.status = status;
                            db.upsert(entry).map(|_| ())
                        }
                        None => Ok(()),
                    });
                    match outcome {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressResult {
        successful_ops: successful.load(Ordering::Relaxed),
        failed_ops: failed.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}

/// Races `threads` opens of one directory and returns how many succeeded
/// while all handles were still held.
pub fn race_opens(path: &std::path::Path, threads: usize) -> usize {
    let path = Arc::new(path.to_path_buf());
    let barrier = Arc::new(std::sync::Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let opened = FileDb::open(&path);
                // hold the handle until every thread has tried
                barrier.wait();
                opened.is_ok()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .filter(|&ok| ok)
        .count()
}

/// Wraps a record for first insertion.
pub fn fresh(n: u64) -> StoredRecord {
    StoredRecord::new(sample_record(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    fn shared_store() -> (Arc<FileDb>, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().unwrap();
        let db = FileDb::open_with_config(
            temp.path(),
            filemeta_core::StoreConfig::new().sync_on_commit(false),
        )
        .unwrap();
        (Arc::new(db), temp)
    }

    #[test]
    fn guarded_cycles_keep_one_entry_per_record() {
        let (db, _temp) = shared_store();
        let config = StressConfig::default();
        populate(&db, &config).unwrap();

        let result = stress_status_cycles(Arc::clone(&db), &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops(), config.threads * config.ops_per_thread);

        assert_eq!(db.count().unwrap(), config.record_count as usize);
        for n in 0..config.record_count {
            let hits = db.scan_prefix(&RecordPrefix::id(sample_id(n))).unwrap();
            assert_eq!(hits.len(), 1, "record {n}");
        }
        assert!(db.verify().unwrap().is_clean());
    }

    #[test]
    fn unguarded_cycles_never_fail() {
        let (db, _temp) = shared_store();
        let config = StressConfig {
            ops_per_thread: 100,
            ..StressConfig::default()
        };
        populate(&db, &config).unwrap();

        let result = stress_unguarded_cycles(Arc::clone(&db), &config);
        assert_eq!(result.failed_ops, 0);
        // stale snapshots may leave extra keys, never fewer than one
        for n in 0..config.record_count {
            assert!(db.exists(&sample_id(n)).unwrap());
        }
    }

    #[test]
    fn only_one_concurrent_open_wins() {
        let temp = tempfile::TempDir::new().unwrap();
        assert_eq!(race_opens(temp.path(), 6), 1);
        // everything released afterwards
        FileDb::open(temp.path()).unwrap();
    }

    #[test]
    fn fresh_records_insert() {
        let store = TestStore::memory();
        store.upsert(fresh(3)).unwrap();
        assert!(store.exists(&sample_id(3)).unwrap());
    }
}
