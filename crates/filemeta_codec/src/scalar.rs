//! Scalar encodings shared by field descriptors.

use crate::error::FieldError;
use chrono::{DateTime, Utc};

/// Width of an encoded timestamp.
pub const TIMESTAMP_WIDTH: usize = 12;

const SIGN_BIT: u64 = 1 << 63;

/// Appends a timestamp as 12 order-preserving bytes.
///
/// Seconds since the epoch go first as a big-endian `i64` with the sign bit
/// flipped, then the sub-second nanoseconds as a big-endian `u32`, so byte
/// order equals chronological order, including before 1970.
pub fn encode_timestamp(ts: &DateTime<Utc>, out: &mut Vec<u8>) {
    let secs = (ts.timestamp() as u64) ^ SIGN_BIT;
    out.extend_from_slice(&secs.to_be_bytes());
    out.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
}

/// Parses bytes written by [`encode_timestamp`].
pub fn decode_timestamp(bytes: &[u8]) -> Result<DateTime<Utc>, FieldError> {
    let raw: [u8; TIMESTAMP_WIDTH] = bytes.try_into().map_err(|_| FieldError::Width {
        expected: TIMESTAMP_WIDTH,
        actual: bytes.len(),
    })?;
    let mut secs = [0u8; 8];
    secs.copy_from_slice(&raw[..8]);
    let mut nanos = [0u8; 4];
    nanos.copy_from_slice(&raw[8..]);

    let secs = (u64::from_be_bytes(secs) ^ SIGN_BIT) as i64;
    let nanos = u32::from_be_bytes(nanos);
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| FieldError::invalid(format!("timestamp {secs}.{nanos:09} out of range")))
}

/// Decodes a UTF-8 text field.
pub fn decode_text(bytes: &[u8]) -> Result<String, FieldError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| FieldError::InvalidUtf8)
}

/// Joins list items with a single-byte separator.
#[must_use]
pub fn join_list<S: AsRef<str>>(items: &[S], sep: u8) -> String {
    let sep = char::from(sep);
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(sep);
        }
        out.push_str(item.as_ref());
    }
    out
}

/// Splits a joined list. The empty string is the empty list.
#[must_use]
pub fn split_list(joined: &str, sep: u8) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(char::from(sep)).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GROUP_SEP;
    use proptest::prelude::*;

    #[test]
    fn timestamp_keeps_subsecond_precision() {
        let ts = DateTime::from_timestamp(1_650_000_000, 123_456_789).unwrap();
        let mut buf = Vec::new();
        encode_timestamp(&ts, &mut buf);
        assert_eq!(buf.len(), TIMESTAMP_WIDTH);
        assert_eq!(decode_timestamp(&buf).unwrap(), ts);
    }

    #[test]
    fn short_timestamp_is_a_width_error() {
        assert_eq!(
            decode_timestamp(&[0u8; 5]),
            Err(FieldError::Width {
                expected: TIMESTAMP_WIDTH,
                actual: 5
            })
        );
    }

    #[test]
    fn list_helpers_treat_empty_as_no_items() {
        assert!(split_list("", GROUP_SEP).is_empty());
        assert_eq!(join_list::<&str>(&[], GROUP_SEP), "");
        let joined = join_list(&["a", "b"], GROUP_SEP);
        assert_eq!(split_list(&joined, GROUP_SEP), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn timestamp_bytes_sort_chronologically(
            a in -62_000_000_000i64..250_000_000_000,
            b in -62_000_000_000i64..250_000_000_000,
            na in 0u32..1_000_000_000,
            nb in 0u32..1_000_000_000,
        ) {
            let ta = DateTime::from_timestamp(a, na).unwrap();
            let tb = DateTime::from_timestamp(b, nb).unwrap();
            let (mut ea, mut eb) = (Vec::new(), Vec::new());
            encode_timestamp(&ta, &mut ea);
            encode_timestamp(&tb, &mut eb);
            prop_assert_eq!(ta.cmp(&tb), ea.cmp(&eb));
        }
    }
}
