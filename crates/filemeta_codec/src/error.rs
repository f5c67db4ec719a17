//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A text field contains the field separator and cannot be stored.
    #[error("field `{field}` contains the field separator")]
    SeparatorInField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A fixed-width field ended early.
    #[error("field `{field}` is truncated")]
    Truncated {
        /// Name of the truncated field.
        field: &'static str,
    },

    /// A field's bytes could not be turned back into a value.
    #[error("field `{field}` is malformed: {message}")]
    Malformed {
        /// Name of the malformed field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// A text field is not valid UTF-8.
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the field.
        field: &'static str,
    },

    /// A key prefix component contains the field separator.
    #[error("key prefix component {index} contains the field separator")]
    SeparatorInPrefix {
        /// Zero-based position of the component.
        index: usize,
    },
}

/// Failure reported by a single field's decode function.
///
/// The codec attaches the field name and turns it into a [`CodecError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Bytes are not UTF-8.
    InvalidUtf8,
    /// A fixed-width field has the wrong length.
    Width {
        /// Declared width.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },
    /// Any other reason the value is unacceptable.
    Invalid(String),
}

impl FieldError {
    /// Creates an `Invalid` error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub(crate) fn in_field(self, field: &'static str) -> CodecError {
        match self {
            Self::InvalidUtf8 => CodecError::InvalidUtf8 { field },
            Self::Width { expected, actual } if actual < expected => {
                CodecError::Truncated { field }
            }
            Self::Width { expected, actual } => CodecError::Malformed {
                field,
                message: format!("expected {expected} bytes, found {actual}"),
            },
            Self::Invalid(message) => CodecError::Malformed { field, message },
        }
    }
}
