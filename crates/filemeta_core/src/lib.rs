//! # filemeta_core
//!
//! Metadata store for uploaded files.
//!
//! Each [`FileRecord`] is stored under a composite key built from its
//! status, id and path, so prefix scans over the key answer "every record
//! in this state", "this id under any state" and "this id at this path"
//! without separate indexes. Because the key depends on fields callers
//! change, an update is a move: [`RecordStore::upsert`] deletes the entry
//! at the key the record was loaded from and inserts the new one in a
//! single write transaction. The loaded key travels inside
//! [`StoredRecord`], so it cannot be lost between load and upsert.
//!
//! [`FileDb`] is the handle applications use. It serializes every
//! operation through one mutex and allows only one open handle per store
//! location.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod dir;
mod error;
mod file_type;
pub mod fingerprint;
mod guard;
mod record;
mod status;
mod store;

pub use config::{StoreConfig, DEFAULT_MIN_ID_PREFIX_LEN};
pub use database::FileDb;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use file_type::FileType;
pub use guard::{LocationLease, StoreRegistry};
pub use record::{FileRecord, GroupList, RefSet, PATH_SEP};
pub use status::Status;
pub use store::{DecodeFailure, RecordPrefix, RecordStore, StoredRecord, VerifyReport};

pub use filemeta_storage::CompactionStats;
