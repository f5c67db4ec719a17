//! # filemeta_codec
//!
//! Turns typed records into delimited composite keys and values.
//!
//! A record type describes its layout once through [`Schema`]: an ordered
//! list of key fields and an ordered list of value fields. [`FieldCodec`]
//! joins the encoded fields with [`FIELD_SEP`], and [`KeyPrefix`] builds the
//! byte prefixes used for scans over the leading key fields.
//!
//! Text fields run to the next separator and may not contain it. Fixed-width
//! fields such as timestamps are consumed by length, so their bytes are
//! unrestricted.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod field;
mod scalar;

/// Separates fields inside a key or value.
pub const FIELD_SEP: u8 = 0x1F;

/// Separates group names inside a group list field.
pub const GROUP_SEP: u8 = 0x1E;

/// Separates referrer ids inside a reference field.
pub const REF_SEP: u8 = 0x1D;

pub use codec::{FieldCodec, KeyPrefix};
pub use error::{CodecError, CodecResult, FieldError};
pub use field::{Field, FieldKind, Schema};
pub use scalar::{
    decode_text, decode_timestamp, encode_timestamp, join_list, split_list, TIMESTAMP_WIDTH,
};
