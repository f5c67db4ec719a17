//! # filemeta storage
//!
//! The embedded ordered key-value engine underneath the filemeta record
//! store, and the append-only byte backends it persists to.
//!
//! - [`StorageBackend`] - opaque append-only byte store
//! - [`InMemoryBackend`] / [`FileBackend`] - its two implementations
//! - [`KvEngine`] - ordered map with snapshot read transactions,
//!   single-writer update transactions and prefix-seeking cursors, made
//!   durable as a log of CRC-checked commit batches
//!
//! ## Example
//!
//! ```rust
//! use filemeta_storage::{KvEngine, StorageError};
//!
//! let engine = KvEngine::in_memory();
//! engine
//!     .update::<_, StorageError, _>(|txn| {
//!         txn.set(b"user/1".as_slice(), b"alice".as_slice());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let hits = engine
//!     .view::<_, StorageError, _>(|txn| {
//!         let mut cursor = txn.cursor();
//!         let mut n = 0;
//!         cursor.seek(b"user/");
//!         while cursor.valid_for_prefix(b"user/") {
//!             n += 1;
//!             cursor.next();
//!         }
//!         Ok(n)
//!     })
//!     .unwrap();
//! assert_eq!(hits, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
pub mod batch;
mod engine;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use batch::{Batch, Op};
pub use engine::{CompactionStats, Cursor, EngineOptions, KvEngine, ReadTxn, WriteTxn};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
