//! Typed field descriptors.

use crate::error::FieldError;

/// How a field's bytes are delimited inside a key or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Runs up to the next field separator. Must not contain it.
    Text,
    /// Occupies exactly this many bytes, which may be anything.
    Fixed(usize),
}

/// One field of a record layout: its name, how it is delimited, and the
/// pair of functions that move it between the record and raw bytes.
pub struct Field<R: 'static> {
    /// Field name, used in error messages.
    pub name: &'static str,
    /// Delimiting rule.
    pub kind: FieldKind,
    /// Appends the field's bytes to the buffer.
    pub encode: fn(&R, &mut Vec<u8>),
    /// Parses the field's bytes into the record.
    pub decode: fn(&mut R, &[u8]) -> Result<(), FieldError>,
}

impl<R> std::fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// The static layout of a record type: which fields form the store key, in
/// order, and which form the value.
///
/// Any change to a key field moves the record to a different key.
pub trait Schema: Default + 'static {
    /// Fields concatenated into the key, most significant first.
    const KEY_FIELDS: &'static [Field<Self>];
    /// Fields concatenated into the value.
    const VALUE_FIELDS: &'static [Field<Self>];
}
