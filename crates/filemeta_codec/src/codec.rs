//! Key/value encoding over a [`Schema`].

use crate::error::{CodecError, CodecResult};
use crate::field::{Field, FieldKind, Schema};
use crate::FIELD_SEP;
use std::marker::PhantomData;

/// Encodes records of type `R` to delimited key and value bytes and back.
///
/// Fields are written in declared order with one [`FIELD_SEP`] byte between
/// consecutive fields. Text fields may not contain the separator; encoding
/// rejects such records instead of producing an ambiguous key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldCodec<R>(PhantomData<fn() -> R>);

impl<R: Schema> FieldCodec<R> {
    /// Encodes the key fields of `record`.
    pub fn encode_key(record: &R) -> CodecResult<Vec<u8>> {
        encode_fields(record, R::KEY_FIELDS)
    }

    /// Encodes the value fields of `record`.
    pub fn encode_value(record: &R) -> CodecResult<Vec<u8>> {
        encode_fields(record, R::VALUE_FIELDS)
    }

    /// Encodes both halves at once.
    pub fn encode(record: &R) -> CodecResult<(Vec<u8>, Vec<u8>)> {
        Ok((Self::encode_key(record)?, Self::encode_value(record)?))
    }

    /// Checks that `record` can be encoded without separator collisions.
    pub fn validate(record: &R) -> CodecResult<()> {
        Self::encode(record).map(|_| ())
    }

    /// Rebuilds a record from stored key and value bytes.
    ///
    /// Fields missing from the end of either byte string keep their
    /// default; bytes after the last declared field are ignored.
    pub fn decode(key: &[u8], value: &[u8]) -> CodecResult<R> {
        let mut record = R::default();
        decode_fields(&mut record, R::KEY_FIELDS, key)?;
        decode_fields(&mut record, R::VALUE_FIELDS, value)?;
        Ok(record)
    }
}

fn encode_fields<R>(record: &R, fields: &[Field<R>]) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEP);
        }
        let start = out.len();
        (field.encode)(record, &mut out);
        let written = &out[start..];
        match field.kind {
            FieldKind::Text => {
                if written.contains(&FIELD_SEP) {
                    return Err(CodecError::SeparatorInField { field: field.name });
                }
            }
            FieldKind::Fixed(width) => {
                if written.len() != width {
                    return Err(CodecError::Malformed {
                        field: field.name,
                        message: format!("encoded {} bytes, declared {width}", written.len()),
                    });
                }
            }
        }
    }
    Ok(out)
}

fn decode_fields<R>(record: &mut R, fields: &[Field<R>], bytes: &[u8]) -> CodecResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let mut pos = 0usize;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            if pos >= bytes.len() {
                break;
            }
            if bytes[pos] != FIELD_SEP {
                return Err(CodecError::Malformed {
                    field: field.name,
                    message: format!("expected separator at byte {pos}"),
                });
            }
            pos += 1;
        }

        let segment = match field.kind {
            FieldKind::Text => {
                let end = bytes[pos..]
                    .iter()
                    .position(|&b| b == FIELD_SEP)
                    .map_or(bytes.len(), |p| pos + p);
                &bytes[pos..end]
            }
            FieldKind::Fixed(width) => {
                let end = pos + width;
                if end > bytes.len() {
                    return Err(CodecError::Truncated { field: field.name });
                }
                &bytes[pos..end]
            }
        };
        pos += segment.len();
        (field.decode)(record, segment).map_err(|e| e.in_field(field.name))?;
    }
    Ok(())
}

/// A byte prefix over the leading key fields, for prefix scans.
///
/// Complete components are followed by the field separator, so `"ab"` as a
/// complete component never matches a key whose field is `"abc"`. The
/// optional trailing partial component has no separator and matches any
/// field value that starts with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix {
    bytes: Vec<u8>,
}

impl KeyPrefix {
    /// Builds a prefix from complete leading components and an optional
    /// open-ended last component.
    pub fn new(complete: &[&[u8]], partial: Option<&[u8]>) -> CodecResult<Self> {
        let mut bytes = Vec::new();
        for (index, part) in complete.iter().enumerate() {
            if part.contains(&FIELD_SEP) {
                return Err(CodecError::SeparatorInPrefix { index });
            }
            bytes.extend_from_slice(part);
            bytes.push(FIELD_SEP);
        }
        if let Some(part) = partial {
            if part.contains(&FIELD_SEP) {
                return Err(CodecError::SeparatorInPrefix {
                    index: complete.len(),
                });
            }
            bytes.extend_from_slice(part);
        }
        Ok(Self { bytes })
    }

    /// The raw prefix bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the prefix matches every key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether `key` starts with this prefix.
    #[must_use]
    pub fn matches(&self, key: &[u8]) -> bool {
        key.starts_with(&self.bytes)
    }
}

impl AsRef<[u8]> for KeyPrefix {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::scalar::{decode_text, decode_timestamp, encode_timestamp, TIMESTAMP_WIDTH};
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Entry {
        kind: String,
        name: String,
        at: DateTime<Utc>,
        note: String,
    }

    impl Schema for Entry {
        const KEY_FIELDS: &'static [Field<Self>] = &[
            Field {
                name: "kind",
                kind: FieldKind::Text,
                encode: |e, out| out.extend_from_slice(e.kind.as_bytes()),
                decode: |e, b| {
                    e.kind = decode_text(b)?;
                    Ok(())
                },
            },
            Field {
                name: "name",
                kind: FieldKind::Text,
                encode: |e, out| out.extend_from_slice(e.name.as_bytes()),
                decode: |e, b| {
                    e.name = decode_text(b)?;
                    Ok(())
                },
            },
        ];
        const VALUE_FIELDS: &'static [Field<Self>] = &[
            Field {
                name: "at",
                kind: FieldKind::Fixed(TIMESTAMP_WIDTH),
                encode: |e, out| encode_timestamp(&e.at, out),
                decode: |e, b| {
                    e.at = decode_timestamp(b)?;
                    Ok(())
                },
            },
            Field {
                name: "note",
                kind: FieldKind::Text,
                encode: |e, out| out.extend_from_slice(e.note.as_bytes()),
                decode: |e, b| {
                    e.note = decode_text(b)?;
                    Ok(())
                },
            },
        ];
    }

    fn entry(kind: &str, name: &str) -> Entry {
        Entry {
            kind: kind.into(),
            name: name.into(),
            at: DateTime::from_timestamp(1_700_000_000, 5).unwrap(),
            note: "n".into(),
        }
    }

    #[test]
    fn key_has_separator_only_between_fields() {
        let key = FieldCodec::encode_key(&entry("doc", "report")).unwrap();
        assert_eq!(key, b"doc\x1freport");
    }

    #[test]
    fn text_with_separator_is_rejected() {
        let bad = entry("doc", "re\x1fport");
        assert_eq!(
            FieldCodec::encode_key(&bad),
            Err(CodecError::SeparatorInField { field: "name" })
        );
    }

    #[test]
    fn timestamp_containing_separator_byte_still_decodes() {
        // 0x1f in both the seconds and nanoseconds bytes
        let mut e = entry("doc", "x");
        e.at = DateTime::from_timestamp(0x1f1f, 0x1f).unwrap();
        let (key, value) = FieldCodec::encode(&e).unwrap();
        assert!(value[..TIMESTAMP_WIDTH].contains(&FIELD_SEP));
        assert_eq!(FieldCodec::<Entry>::decode(&key, &value).unwrap(), e);
    }

    #[test]
    fn trailing_segments_are_ignored() {
        let e = entry("doc", "x");
        let (mut key, value) = FieldCodec::encode(&e).unwrap();
        key.extend_from_slice(b"\x1fextra\x1fmore");
        assert_eq!(FieldCodec::<Entry>::decode(&key, &value).unwrap(), e);
    }

    #[test]
    fn missing_trailing_fields_keep_defaults() {
        let decoded = FieldCodec::<Entry>::decode(b"doc", b"").unwrap();
        assert_eq!(decoded.kind, "doc");
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.note, "");
    }

    #[test]
    fn truncated_fixed_field_is_an_error() {
        let err = FieldCodec::<Entry>::decode(b"doc\x1fx", &[0u8; 4]).unwrap_err();
        assert_eq!(err, CodecError::Truncated { field: "at" });
    }

    #[test]
    fn invalid_utf8_names_the_field() {
        let err = FieldCodec::<Entry>::decode(b"doc\x1f\xff", b"").unwrap_err();
        assert_eq!(err, CodecError::InvalidUtf8 { field: "name" });
        assert_eq!(
            FieldError::invalid("x").in_field("note"),
            CodecError::Malformed {
                field: "note",
                message: "x".into()
            }
        );
    }

    #[test]
    fn prefix_complete_vs_partial() {
        let key = FieldCodec::encode_key(&entry("doc", "report")).unwrap();

        let partial = KeyPrefix::new(&[b"doc"], Some(b"rep")).unwrap();
        assert!(partial.matches(&key));

        let complete_short = KeyPrefix::new(&[b"do"], None).unwrap();
        assert!(!complete_short.matches(&key));

        let open_short = KeyPrefix::new(&[], Some(b"do")).unwrap();
        assert!(open_short.matches(&key));

        assert_eq!(
            KeyPrefix::new(&[b"a\x1fb"], None),
            Err(CodecError::SeparatorInPrefix { index: 0 })
        );
    }

    proptest! {
        #[test]
        fn separator_free_records_round_trip(
            kind in "[a-z]{0,8}",
            name in "[ -~]{0,24}",
            note in "\\PC{0,32}",
            secs in -1_000_000_000i64..4_000_000_000,
            nanos in 0u32..1_000_000_000,
        ) {
            let e = Entry {
                kind,
                name,
                at: DateTime::from_timestamp(secs, nanos).unwrap(),
                note,
            };
            let (key, value) = FieldCodec::encode(&e).unwrap();
            prop_assert_eq!(FieldCodec::<Entry>::decode(&key, &value).unwrap(), e);
        }
    }
}
