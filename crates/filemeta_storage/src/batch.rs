//! Commit batch format.
//!
//! Every committed write transaction is appended to the log as one batch:
//!
//! ```text
//! | magic "FMKV" (4) | version u16 | op_count u32 | payload_len u32 | payload | crc32 u32 |
//! ```
//!
//! All integers are little-endian. The payload is `op_count` operations:
//!
//! ```text
//! Set:    | 1 | key_len u32 | key | value_len u32 | value |
//! Delete: | 2 | key_len u32 | key |
//! ```
//!
//! The checksum covers the header and the payload. A batch is either
//! replayed whole or not at all.

use crate::error::{StorageError, StorageResult};

/// Magic bytes opening every batch.
pub const BATCH_MAGIC: [u8; 4] = *b"FMKV";

/// Current batch format version.
pub const BATCH_VERSION: u16 = 1;

const HEADER_LEN: usize = 14;
const CRC_LEN: usize = 4;

const TAG_SET: u8 = 1;
const TAG_DELETE: u8 = 2;

/// A single mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Insert or overwrite `key`.
    Set {
        /// Entry key.
        key: Vec<u8>,
        /// Entry value.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Entry key.
        key: Vec<u8>,
    },
}

impl Op {
    /// Returns the key this operation touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered list of operations committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a set operation.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(Op::Set { key, value });
    }

    /// Adds a delete operation.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(Op::Delete { key });
    }

    /// Returns the operations in commit order.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Consumes the batch, returning its operations.
    #[must_use]
    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch carries no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Serializes the batch with its envelope and checksum.
    ///
    /// # Errors
    ///
    /// Fails if a key, a value, the op count or the payload exceed the
    /// 4-byte length fields of the format.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut payload = Vec::new();
        for op in &self.ops {
            match op {
                Op::Set { key, value } => {
                    payload.push(TAG_SET);
                    put_bytes(&mut payload, key)?;
                    put_bytes(&mut payload, value)?;
                }
                Op::Delete { key } => {
                    payload.push(TAG_DELETE);
                    put_bytes(&mut payload, key)?;
                }
            }
        }

        let op_count = len_u32(self.ops.len())?;
        let payload_len = len_u32(payload.len())?;

        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
        buf.extend_from_slice(&BATCH_MAGIC);
        buf.extend_from_slice(&BATCH_VERSION.to_le_bytes());
        buf.extend_from_slice(&op_count.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&payload);
        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes the batch starting at the beginning of `data`.
    ///
    /// Returns the batch and the number of bytes it occupied. `offset` is the
    /// log position of `data[0]` and only feeds error messages.
    pub fn decode(data: &[u8], offset: u64) -> StorageResult<(Self, usize)> {
        if data.len() < HEADER_LEN {
            return Err(StorageError::corrupted(offset, "truncated batch header"));
        }
        if data[0..4] != BATCH_MAGIC {
            return Err(StorageError::corrupted(offset, "bad batch magic"));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != BATCH_VERSION {
            return Err(StorageError::corrupted(
                offset,
                format!("unsupported batch version {version}"),
            ));
        }
        let op_count = read_u32(data, 6) as usize;
        let payload_len = read_u32(data, 10) as usize;

        let total = HEADER_LEN + payload_len + CRC_LEN;
        if data.len() < total {
            return Err(StorageError::corrupted(
                offset,
                format!("truncated batch: need {total} bytes, have {}", data.len()),
            ));
        }

        let body_end = HEADER_LEN + payload_len;
        let stored_crc = read_u32(data, body_end);
        let computed_crc = compute_crc32(&data[..body_end]);
        if stored_crc != computed_crc {
            return Err(StorageError::corrupted(
                offset,
                format!("checksum mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"),
            ));
        }

        let payload = &data[HEADER_LEN..body_end];
        let mut cursor = 0usize;
        let mut ops = Vec::with_capacity(op_count.min(1024));
        for _ in 0..op_count {
            let tag = *payload
                .get(cursor)
                .ok_or_else(|| StorageError::corrupted(offset, "missing op tag"))?;
            cursor += 1;
            let key = take_bytes(payload, &mut cursor, offset)?;
            match tag {
                TAG_SET => {
                    let value = take_bytes(payload, &mut cursor, offset)?;
                    ops.push(Op::Set { key, value });
                }
                TAG_DELETE => ops.push(Op::Delete { key }),
                other => {
                    return Err(StorageError::corrupted(
                        offset,
                        format!("unknown op tag {other}"),
                    ))
                }
            }
        }
        if cursor != payload.len() {
            return Err(StorageError::corrupted(
                offset,
                format!(
                    "trailing bytes in batch payload: used {cursor} of {}",
                    payload.len()
                ),
            ));
        }

        Ok((Self { ops }, total))
    }
}

/// Result of walking a log from the start.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Batches that decoded cleanly, in log order.
    pub batches: Vec<Batch>,
    /// Length of the clean prefix of the log.
    pub valid_len: u64,
    /// Why the walk stopped early, if it did.
    pub tail_error: Option<StorageError>,
}

/// Decodes consecutive batches until the data ends or a batch is damaged.
#[must_use]
pub fn scan_log(data: &[u8]) -> LogScan {
    let mut scan = LogScan::default();
    let mut pos = 0usize;
    while pos < data.len() {
        match Batch::decode(&data[pos..], pos as u64) {
            Ok((batch, used)) => {
                scan.batches.push(batch);
                pos += used;
            }
            Err(err) => {
                scan.tail_error = Some(err);
                break;
            }
        }
    }
    scan.valid_len = pos as u64;
    scan
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}

fn len_u32(len: usize) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("length {len} exceeds the 4-byte batch field"),
        ))
    })
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    buf.extend_from_slice(&len_u32(bytes.len())?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn take_bytes(payload: &[u8], cursor: &mut usize, offset: u64) -> StorageResult<Vec<u8>> {
    if payload.len() < *cursor + 4 {
        return Err(StorageError::corrupted(offset, "truncated length field"));
    }
    let len = read_u32(payload, *cursor) as usize;
    *cursor += 4;
    if payload.len() < *cursor + len {
        return Err(StorageError::corrupted(offset, "truncated op bytes"));
    }
    let bytes = payload[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Batch {
        let mut batch = Batch::new();
        batch.delete(b"received\x1fold".to_vec());
        batch.set(b"received\x1fnew".to_vec(), b"value".to_vec());
        batch
    }

    #[test]
    fn encoded_batch_decodes_to_same_ops() {
        let bytes = sample().encode().unwrap();
        let (decoded, used) = Batch::decode(&bytes, 0).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(used, bytes.len());
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = sample().encode().unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = Batch::decode(&bytes, 0).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }

    #[test]
    fn scan_stops_at_torn_tail() {
        let mut log = sample().encode().unwrap();
        let clean = log.len() as u64;
        let second = sample().encode().unwrap();
        log.extend_from_slice(&second[..second.len() - 3]);

        let scan = scan_log(&log);
        assert_eq!(scan.batches.len(), 1);
        assert_eq!(scan.valid_len, clean);
        assert!(scan.tail_error.is_some());
    }

    #[test]
    fn empty_log_scans_clean() {
        let scan = scan_log(&[]);
        assert!(scan.batches.is_empty());
        assert_eq!(scan.valid_len, 0);
        assert!(scan.tail_error.is_none());
    }

    #[test]
    fn crc_matches_reference_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }
}
