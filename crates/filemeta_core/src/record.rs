//! The file metadata record and its storage layout.
//!
//! Key layout, fields joined by [`FIELD_SEP`]:
//!
//! ```text
//! status ␟ id ␟ path
//! ```
//!
//! Value layout:
//!
//! ```text
//! timestamp(12 bytes) ␟ group␞group… ␟ note ␟ ref␝ref…
//! ```
//!
//! Status leads so a scan over one status prefix lists every record in that
//! state. Id follows so `status + id` finds a file without knowing its path.

use crate::error::{CoreError, CoreResult};
use crate::file_type::FileType;
use crate::fingerprint::normalize_id;
use crate::status::Status;
use chrono::{DateTime, Utc};
use filemeta_codec::{
    decode_text, decode_timestamp, encode_timestamp, join_list, split_list, Field, FieldError,
    FieldKind, Schema, FIELD_SEP, GROUP_SEP, REF_SEP, TIMESTAMP_WIDTH,
};

/// Separator between path segments in a stored path.
pub const PATH_SEP: char = '/';

/// Ordered group hierarchy of a file, outermost group first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupList(Vec<String>);

impl GroupList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The group names, outermost first.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the file belongs to no group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the first groups equal `prefix`, name by name.
    #[must_use]
    pub fn starts_with<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        prefix.len() <= self.0.len()
            && self.0.iter().zip(prefix).all(|(g, p)| g == p.as_ref())
    }

    /// The groups as a relative directory path, `a/b/c`.
    #[must_use]
    pub fn to_path(&self) -> String {
        self.0.join("/")
    }

    /// Joined form stored in the record value.
    #[must_use]
    pub fn encode(&self) -> String {
        join_list(&self.0, GROUP_SEP)
    }

    /// Parses the stored form.
    #[must_use]
    pub fn decode(joined: &str) -> Self {
        Self(split_list(joined, GROUP_SEP))
    }
}

impl<S: Into<String>> FromIterator<S> for GroupList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Codes of the external records that refer to a file.
///
/// Behaves as a set that remembers insertion order. An empty set means
/// nothing uses the file any more.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSet(Vec<String>);

impl RefSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `code`. Returns `false` if it was already present.
    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        let code = code.into();
        if self.contains(&code) {
            return false;
        }
        self.0.push(code);
        true
    }

    /// Removes `code`. Returns `false` if it was not present.
    pub fn remove(&mut self, code: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != code);
        self.0.len() != before
    }

    /// Whether `code` is present.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    /// Number of codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no code refers to the file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates codes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Joined form stored in the record value.
    #[must_use]
    pub fn encode(&self) -> String {
        join_list(&self.0, REF_SEP)
    }

    /// Parses the stored form, dropping duplicates.
    #[must_use]
    pub fn decode(joined: &str) -> Self {
        let mut set = Self::new();
        for code in split_list(joined, REF_SEP) {
            set.insert(code);
        }
        set
    }
}

/// Metadata of one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Content fingerprint, see [`crate::fingerprint::file_id`].
    pub id: String,
    /// Location on disk, `<owner dir>/<groups…>/<type>/<name>`.
    pub path: String,
    /// Lifecycle state.
    pub status: Status,
    /// Creation or last write time.
    pub timestamp: DateTime<Utc>,
    /// Group hierarchy. Change it with [`FileRecord::set_group`] so the path
    /// follows.
    pub groups: GroupList,
    /// Free-text annotation.
    pub note: String,
    /// Referrers.
    pub ref_by: RefSet,
}

impl Default for FileRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            path: String::new(),
            status: Status::Unknown,
            timestamp: DateTime::<Utc>::default(),
            groups: GroupList::new(),
            note: String::new(),
            ref_by: RefSet::new(),
        }
    }
}

impl FileRecord {
    /// Creates a record stamped with the current time.
    pub fn new(id: impl Into<String>, path: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            status,
            timestamp: Utc::now(),
            ..Self::default()
        }
    }

    /// Replaces the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Last path segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit(PATH_SEP).next().unwrap_or_default()
    }

    /// The directory segment enclosing the file name.
    #[must_use]
    pub fn type_segment(&self) -> &str {
        let mut segments = self.path.rsplit(PATH_SEP);
        segments.next();
        segments.next().unwrap_or_default()
    }

    /// The file type named by [`type_segment`](Self::type_segment), if it is
    /// registered.
    #[must_use]
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_path_segment(self.type_segment())
    }

    /// MIME type for media files (`video/mp4`), empty for anything else.
    #[must_use]
    pub fn media_type(&self) -> String {
        let Some(prefix) = self.file_type().and_then(FileType::media_prefix) else {
            return String::new();
        };
        let name = self.name();
        let ext = name.rsplit_once('.').map_or("", |(_, ext)| ext);
        format!("{prefix}/{ext}")
    }

    /// Replaces the note.
    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = note.into();
    }

    /// Sets group `index`, or appends when `index` is past the end, and
    /// moves the path to match.
    ///
    /// The group directories sit between the owner directory and the type
    /// directory: `/u/alice/doc/x` in group `g1` becomes `/u/alice/g1/doc/x`.
    /// Returns the previous path so the caller can move the file. Nothing
    /// changes on error.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the name is unusable or the path does not
    /// have the expected shape.
    pub fn set_group(&mut self, index: usize, name: impl Into<String>) -> CoreResult<String> {
        let name = name.into();
        check_group_name(&name)?;

        let mut groups = self.groups.0.clone();
        if index < groups.len() {
            groups[index] = name;
        } else {
            groups.push(name);
        }

        let segments: Vec<&str> = self.path.split(PATH_SEP).collect();
        let old = self.groups.len();
        // type dir and file name follow the groups
        if segments.len() < old + 2 {
            return Err(CoreError::invalid_record(format!(
                "path {} has no room for {old} group directories",
                self.path
            )));
        }
        let end = segments.len() - 2;
        let start = end - old;
        if segments[start..end] != self.groups.0[..] {
            return Err(CoreError::invalid_record(format!(
                "path {} does not contain group path {}",
                self.path,
                self.groups.to_path()
            )));
        }
        let new_path = segments[..start]
            .iter()
            .copied()
            .chain(groups.iter().map(String::as_str))
            .chain(segments[end..].iter().copied())
            .collect::<Vec<_>>()
            .join("/");

        self.groups = GroupList(groups);
        Ok(std::mem::replace(&mut self.path, new_path))
    }

    /// Records that `code` refers to this file. Returns `false` if it already
    /// did.
    pub fn add_ref(&mut self, code: impl Into<String>) -> bool {
        self.ref_by.insert(code)
    }

    /// Drops the reference from `code`. Returns `false` if there was none.
    pub fn remove_ref(&mut self, code: &str) -> bool {
        self.ref_by.remove(code)
    }

    /// Whether anything still refers to this file.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        !self.ref_by.is_empty()
    }

    /// Checks that the record can be stored and read back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` naming the first offending field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.id.is_empty() {
            return Err(CoreError::invalid_record("id is empty"));
        }
        // lookups normalize the id, so a stored id must already be normal
        if self.id != normalize_id(&self.id) {
            return Err(CoreError::invalid_record(format!(
                "id {:?} must be trimmed lower case",
                self.id
            )));
        }
        for (field, text) in [("id", &self.id), ("path", &self.path), ("note", &self.note)] {
            if text.as_bytes().contains(&FIELD_SEP) {
                return Err(CoreError::invalid_record(format!(
                    "{field} contains the field separator"
                )));
            }
        }
        for group in &self.groups.0 {
            check_group_name(group)?;
        }
        for code in &self.ref_by.0 {
            if code.is_empty() {
                return Err(CoreError::invalid_record("empty reference code"));
            }
            if code.bytes().any(|b| b == FIELD_SEP || b == REF_SEP) {
                return Err(CoreError::invalid_record(format!(
                    "reference code {code:?} contains a separator"
                )));
            }
        }
        Ok(())
    }
}

fn check_group_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_record("empty group name"));
    }
    if name.contains(PATH_SEP) || name.bytes().any(|b| b == FIELD_SEP || b == GROUP_SEP) {
        return Err(CoreError::invalid_record(format!(
            "group name {name:?} contains a separator"
        )));
    }
    Ok(())
}

fn invalid(err: CoreError) -> FieldError {
    FieldError::invalid(err.to_string())
}

fn encode_status(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.status.as_str().as_bytes());
}

fn decode_status(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.status = decode_text(bytes)?.parse().map_err(invalid)?;
    Ok(())
}

fn encode_id(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.id.as_bytes());
}

fn decode_id(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.id = decode_text(bytes)?;
    Ok(())
}

fn encode_path(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.path.as_bytes());
}

fn decode_path(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.path = decode_text(bytes)?;
    Ok(())
}

fn encode_time(r: &FileRecord, out: &mut Vec<u8>) {
    encode_timestamp(&r.timestamp, out);
}

fn decode_time(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.timestamp = decode_timestamp(bytes)?;
    Ok(())
}

fn encode_groups(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.groups.encode().as_bytes());
}

fn decode_groups(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.groups = GroupList::decode(&decode_text(bytes)?);
    Ok(())
}

fn encode_note(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.note.as_bytes());
}

fn decode_note(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.note = decode_text(bytes)?;
    Ok(())
}

fn encode_refs(r: &FileRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(r.ref_by.encode().as_bytes());
}

fn decode_refs(r: &mut FileRecord, bytes: &[u8]) -> Result<(), FieldError> {
    r.ref_by = RefSet::decode(&decode_text(bytes)?);
    Ok(())
}

impl Schema for FileRecord {
    const KEY_FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "status",
            kind: FieldKind::Text,
            encode: encode_status,
            decode: decode_status,
        },
        Field {
            name: "id",
            kind: FieldKind::Text,
            encode: encode_id,
            decode: decode_id,
        },
        Field {
            name: "path",
            kind: FieldKind::Text,
            encode: encode_path,
            decode: decode_path,
        },
    ];

    const VALUE_FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "timestamp",
            kind: FieldKind::Fixed(TIMESTAMP_WIDTH),
            encode: encode_time,
            decode: decode_time,
        },
        Field {
            name: "groups",
            kind: FieldKind::Text,
            encode: encode_groups,
            decode: decode_groups,
        },
        Field {
            name: "note",
            kind: FieldKind::Text,
            encode: encode_note,
            decode: decode_note,
        },
        Field {
            name: "ref_by",
            kind: FieldKind::Text,
            encode: encode_refs,
            decode: decode_refs,
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemeta_codec::{CodecError, FieldCodec};

    fn record(path: &str) -> FileRecord {
        FileRecord::new("0123456789abcdef0123456789abcdef-1700000000000", path, Status::Received)
    }

    #[test]
    fn key_starts_with_status_then_id() {
        let r = record("/u/alice/text/a.txt");
        let key = FieldCodec::encode_key(&r).unwrap();
        let expected = format!("received\x1f{}\x1f/u/alice/text/a.txt", r.id);
        assert_eq!(key, expected.as_bytes());
    }

    #[test]
    fn full_record_round_trips() {
        let mut r = record("/u/alice/g1/g2/video/clip.mp4");
        r.groups = ["g1", "g2"].into_iter().collect();
        r.note = "holiday ^^ clip".into();
        r.add_ref("form-1");
        r.add_ref("form-2");

        let (key, value) = FieldCodec::encode(&r).unwrap();
        assert_eq!(FieldCodec::<FileRecord>::decode(&key, &value).unwrap(), r);
    }

    #[test]
    fn unknown_status_in_key_is_malformed() {
        let err = FieldCodec::<FileRecord>::decode(b"archived\x1fid\x1fp", b"").unwrap_err();
        assert!(matches!(err, CodecError::Malformed { field: "status", .. }));
    }

    #[test]
    fn path_derived_properties() {
        let r = record("/u/alice/projectA/video/clip.final.mp4");
        assert_eq!(r.name(), "clip.final.mp4");
        assert_eq!(r.type_segment(), "video");
        assert_eq!(r.file_type(), Some(FileType::Video));
        assert_eq!(r.media_type(), "video/mp4");

        let doc = record("/u/alice/doc/report.txt");
        assert_eq!(doc.file_type(), None);
        assert_eq!(doc.media_type(), "");
    }

    #[test]
    fn first_group_is_inserted_before_type_dir() {
        let mut r = record("/u/alice/doc/report.txt");
        let old = r.set_group(0, "projectA").unwrap();
        assert_eq!(old, "/u/alice/doc/report.txt");
        assert_eq!(r.path, "/u/alice/projectA/doc/report.txt");
        assert_eq!(r.groups.as_slice(), ["projectA"]);
    }

    #[test]
    fn existing_groups_are_replaced_in_path() {
        let mut r = record("/u/alice/doc/report.txt");
        r.set_group(0, "projectA").unwrap();
        r.set_group(5, "draft").unwrap();
        assert_eq!(r.path, "/u/alice/projectA/draft/doc/report.txt");

        r.set_group(0, "projectB").unwrap();
        assert_eq!(r.path, "/u/alice/projectB/draft/doc/report.txt");
        assert_eq!(r.groups.encode(), "projectB\u{1e}draft");
    }

    #[test]
    fn bad_group_leaves_record_untouched() {
        let mut r = record("/u/alice/doc/report.txt");
        let before = r.clone();
        assert!(r.set_group(0, "").is_err());
        assert!(r.set_group(0, "a/b").is_err());
        assert_eq!(r, before);

        let mut mismatched = record("/u/alice/doc/report.txt");
        mismatched.groups = ["elsewhere"].into_iter().collect();
        assert!(matches!(
            mismatched.set_group(0, "x"),
            Err(CoreError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn refs_behave_as_a_set() {
        let mut r = record("/u/alice/doc/report.txt");
        assert!(!r.is_referenced());
        assert!(r.add_ref("a"));
        assert!(r.add_ref("b"));
        assert!(!r.add_ref("a"));
        assert_eq!(r.ref_by.iter().collect::<Vec<_>>(), ["a", "b"]);
        assert!(r.remove_ref("a"));
        assert!(!r.remove_ref("a"));
        assert!(r.is_referenced());
        assert_eq!(RefSet::decode("x\u{1d}y\u{1d}x").len(), 2);
    }

    #[test]
    fn group_prefix_matches_whole_names() {
        let groups: GroupList = ["projectA", "draft"].into_iter().collect();
        assert!(groups.starts_with(&["projectA"]));
        assert!(groups.starts_with::<&str>(&[]));
        assert!(!groups.starts_with(&["project"]));
        assert!(!groups.starts_with(&["projectA", "draft", "v2"]));
    }

    #[test]
    fn validate_rejects_separators_and_upper_case_ids() {
        assert!(record("/u/a/text/x").validate().is_ok());

        let mut r = record("/u/a/text/x");
        r.note = "bad\x1fnote".into();
        assert!(r.validate().is_err());

        let mut r = record("/u/a/text/x");
        r.id = r.id.to_uppercase();
        assert!(r.validate().is_err());

        let mut r = record("/u/a/text/x");
        r.ref_by.insert("a\u{1d}b");
        assert!(r.validate().is_err());
    }

    #[test]
    fn validate_rejects_ids_lookups_cannot_reach() {
        let base = record("/u/a/text/x").id;
        for id in [format!(" {base}"), format!("{base}\t"), format!("\u{1c5}{base}")] {
            let mut r = record("/u/a/text/x");
            r.id = id.clone();
            assert!(r.validate().is_err(), "accepted {id:?}");
        }
    }
}
