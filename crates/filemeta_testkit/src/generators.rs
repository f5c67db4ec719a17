//! Property-based test generators using proptest.
//!
//! Generated records always satisfy [`FileRecord::validate`]: text never
//! contains a separator, ids are lower case, and the path places the groups
//! between the owner directory and the type directory.

use chrono::{DateTime, Utc};
use filemeta_core::{FileRecord, FileType, GroupList, RefSet, Status};
use proptest::prelude::*;

/// Strategy for record ids: 32 hex digits and an optional millisecond suffix.
pub fn id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{32}(-[0-9]{13})?").expect("invalid regex")
}

/// Strategy for any status.
pub fn status_strategy() -> impl Strategy<Value = Status> {
    prop::sample::select(Status::ALL.to_vec())
}

/// Strategy for any registered file type.
pub fn file_type_strategy() -> impl Strategy<Value = FileType> {
    prop::sample::select(FileType::ALL.to_vec())
}

/// Strategy for a single path segment or group name.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}").expect("invalid regex")
}

/// Strategy for timestamps between 1900 and 2200, with nanoseconds.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (-2_208_988_800i64..7_258_118_400, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        DateTime::from_timestamp(secs, nanos).unwrap_or_default()
    })
}

/// Strategy for free text without control characters.
pub fn note_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\\p{Cc}]{0,40}").expect("invalid regex")
}

/// Strategy for a reference set.
pub fn ref_set_strategy() -> impl Strategy<Value = RefSet> {
    prop::collection::vec(segment_strategy(), 0..4).prop_map(|codes| {
        let mut set = RefSet::new();
        for code in codes {
            set.insert(code);
        }
        set
    })
}

/// Strategy for a path and the group list it encodes.
pub fn path_strategy() -> impl Strategy<Value = (String, GroupList)> {
    (
        segment_strategy(),
        prop::collection::vec(segment_strategy(), 0..3),
        file_type_strategy(),
        segment_strategy(),
    )
        .prop_map(|(owner, groups, file_type, name)| {
            let mut segments = vec![String::new(), "u".to_owned(), owner];
            segments.extend(groups.iter().cloned());
            segments.push(file_type.as_str().to_owned());
            segments.push(name);
            (segments.join("/"), groups.into_iter().collect())
        })
}

/// Strategy for complete, valid records.
pub fn record_strategy() -> impl Strategy<Value = FileRecord> {
    (
        id_strategy(),
        path_strategy(),
        status_strategy(),
        timestamp_strategy(),
        note_strategy(),
        ref_set_strategy(),
    )
        .prop_map(|(id, (path, groups), status, timestamp, note, ref_by)| FileRecord {
            id,
            path,
            status,
            timestamp,
            groups,
            note,
            ref_by,
        })
}

/// One in-place change to a loaded record.
#[derive(Debug, Clone)]
pub enum RecordChange {
    /// Move to another status.
    Status(Status),
    /// Replace the note.
    Note(String),
    /// Set or append a group.
    Group(usize, String),
    /// Add a referrer.
    AddRef(String),
    /// Remove the first referrer, if any.
    DropRef,
    /// Touch the timestamp.
    Timestamp(DateTime<Utc>),
}

impl RecordChange {
    /// Applies the change.
    pub fn apply(&self, record: &mut FileRecord) {
        match self {
            Self::Status(status) => record.status = *status,
            Self::Note(note) => record.set_note(note.clone()),
            Self::Group(index, name) => {
                record
                    .set_group(*index, name.clone())
                    .expect("generated paths always have room for groups");
            }
            Self::AddRef(code) => {
                record.add_ref(code.clone());
            }
            Self::DropRef => {
                let first = record.ref_by.iter().next().map(str::to_owned);
                if let Some(code) = first {
                    record.remove_ref(&code);
                }
            }
            Self::Timestamp(ts) => record.timestamp = *ts,
        }
    }
}

/// Strategy for a record change.
pub fn change_strategy() -> impl Strategy<Value = RecordChange> {
    prop_oneof![
        status_strategy().prop_map(RecordChange::Status),
        note_strategy().prop_map(RecordChange::Note),
        (0usize..4, segment_strategy()).prop_map(|(i, name)| RecordChange::Group(i, name)),
        segment_strategy().prop_map(RecordChange::AddRef),
        Just(RecordChange::DropRef),
        timestamp_strategy().prop_map(RecordChange::Timestamp),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;
    use filemeta_codec::FieldCodec;
    use filemeta_core::{RecordPrefix, StoredRecord};

    proptest! {
        #[test]
        fn generated_records_are_valid(record in record_strategy()) {
            prop_assert!(record.validate().is_ok());
        }

        #[test]
        fn codec_round_trip(record in record_strategy()) {
            let (key, value) = FieldCodec::encode(&record).unwrap();
            let decoded = FieldCodec::<FileRecord>::decode(&key, &value).unwrap();
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn one_live_entry_after_any_changes(
            record in record_strategy(),
            changes in prop::collection::vec(change_strategy(), 1..12),
        ) {
            let store = TestStore::memory();
            let id = record.id.clone();
            let mut entry = store.upsert(StoredRecord::new(record)).unwrap();

            for change in &changes {
                change.apply(&mut entry);
                entry = store.upsert(entry).unwrap();
            }

            let all = store.scan_prefix(&RecordPrefix::id(id.as_str())).unwrap();
            prop_assert_eq!(all.len(), 1);
            prop_assert_eq!(all[0].record(), entry.record());
            prop_assert_eq!(store.count().unwrap(), 1);
        }

        #[test]
        fn repeated_upsert_is_idempotent(record in record_strategy()) {
            let store = TestStore::memory();
            let entry = store.upsert(StoredRecord::new(record)).unwrap();
            let size = store.log_size().unwrap();

            let again = store.upsert(entry.clone()).unwrap();
            prop_assert_eq!(again, entry);
            prop_assert_eq!(store.log_size().unwrap(), size);
            prop_assert_eq!(store.count().unwrap(), 1);
        }

        #[test]
        fn keys_group_by_status(a in record_strategy(), b in record_strategy()) {
            prop_assume!(a.status != b.status);
            let ka = FieldCodec::encode_key(&a).unwrap();
            let kb = FieldCodec::encode_key(&b).unwrap();
            prop_assert_eq!(ka.cmp(&kb), a.status.as_str().cmp(b.status.as_str()));
        }
    }
}
