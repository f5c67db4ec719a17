//! Error types for filemeta core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in filemeta core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key-value engine error.
    #[error("storage error: {0}")]
    Storage(#[from] filemeta_storage::StorageError),

    /// Field codec error.
    #[error("codec error: {0}")]
    Codec(#[from] filemeta_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An id prefix is too short to be used for removal.
    #[error("id prefix has {len} characters, at least {min} required")]
    PrefixTooShort {
        /// Length of the supplied id.
        len: usize,
        /// Configured minimum.
        min: usize,
    },

    /// A status name is not registered.
    #[error("unknown status: {name}")]
    UnknownStatus {
        /// The rejected name.
        name: String,
    },

    /// A file type name is not registered.
    #[error("unknown file type: {name}")]
    UnknownFileType {
        /// The rejected name.
        name: String,
    },

    /// A record cannot be stored as it is.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// What is wrong with it.
        message: String,
    },

    /// No record matches the id.
    #[error("record not found: {id}")]
    RecordNotFound {
        /// The id searched for.
        id: String,
    },

    /// The location is already open, in this process or another.
    #[error("store locked: {} is already open", path.display())]
    StoreLocked {
        /// Location of the store.
        path: PathBuf,
    },

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// The store directory is missing or not usable.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates a record not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::RecordNotFound { id: id.into() }
    }

    /// Creates a store locked error.
    pub fn locked(path: impl Into<PathBuf>) -> Self {
        Self::StoreLocked { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        let err = CoreError::PrefixTooShort { len: 3, min: 32 };
        assert_eq!(
            err.to_string(),
            "id prefix has 3 characters, at least 32 required"
        );

        let err = CoreError::locked("/tmp/store");
        assert!(err.to_string().contains("/tmp/store"));
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = filemeta_storage::StorageError::Closed.into();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
