//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod list;
pub mod modify;
pub mod show;
pub mod verify;

use filemeta_core::{FileDb, FileRecord, StoreConfig};
use serde::Serialize;
use std::path::Path;

/// Opens an existing store. Commands never create one.
pub fn open_store(path: &Path) -> Result<FileDb, Box<dyn std::error::Error>> {
    Ok(FileDb::open_with_config(
        path,
        StoreConfig::new().create_if_missing(false),
    )?)
}

/// Serializable form of a record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Record id.
    pub id: String,
    /// Lifecycle status.
    pub status: String,
    /// Path on disk.
    pub path: String,
    /// Type directory.
    #[serde(rename = "type")]
    pub file_type: String,
    /// MIME type for media, empty otherwise.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub media_type: String,
    /// RFC 3339 timestamp.
    pub time: String,
    /// Groups, outermost first.
    pub groups: Vec<String>,
    /// Note.
    pub note: String,
    /// Referrer codes.
    pub ref_by: Vec<String>,
}

impl From<&FileRecord> for RecordView {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status.to_string(),
            path: record.path.clone(),
            file_type: record.type_segment().to_owned(),
            media_type: record.media_type(),
            time: record.timestamp.to_rfc3339(),
            groups: record.groups.as_slice().to_vec(),
            note: record.note.clone(),
            ref_by: record.ref_by.iter().map(str::to_owned).collect(),
        }
    }
}

/// Prints a record as indented `key: value` lines.
pub fn print_record(view: &RecordView) {
    println!("{}", view.id);
    println!("  status:  {}", view.status);
    println!("  path:    {}", view.path);
    println!("  type:    {}", view.file_type);
    if !view.media_type.is_empty() {
        println!("  media:   {}", view.media_type);
    }
    println!("  time:    {}", view.time);
    if !view.groups.is_empty() {
        println!("  groups:  {}", view.groups.join(" / "));
    }
    if !view.note.is_empty() {
        println!("  note:    {}", view.note);
    }
    if !view.ref_by.is_empty() {
        println!("  refs:    {}", view.ref_by.join(", "));
    }
}
