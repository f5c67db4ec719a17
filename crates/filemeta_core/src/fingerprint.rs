//! Content fingerprints used as record ids.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Length of the hex digest at the start of every id.
pub const DIGEST_HEX_LEN: usize = 64;

/// Builds the id of a stored file: the lower-case hex SHA-256 of its
/// content, a dash, and the creation time in unix milliseconds.
///
/// Identical content uploaded at different times gets different ids that
/// share the digest prefix.
#[must_use]
pub fn file_id(content: &[u8], created: DateTime<Utc>) -> String {
    let digest: String = Sha256::digest(content)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("{digest}-{}", created.timestamp_millis())
}

/// Canonical form of an id or id prefix supplied by a caller.
#[must_use]
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        let created = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let id = file_id(b"abc", created);
        assert_eq!(
            id,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad-1700000000123"
        );
    }

    #[test]
    fn same_content_shares_prefix() {
        let a = file_id(b"same", DateTime::from_timestamp_millis(1).unwrap());
        let b = file_id(b"same", DateTime::from_timestamp_millis(2).unwrap());
        assert_ne!(a, b);
        assert_eq!(a[..DIGEST_HEX_LEN], b[..DIGEST_HEX_LEN]);
    }

    #[test]
    fn normalize_lowercases() {
        assert_eq!(normalize_id(" ABCdef "), "abcdef");
    }
}
