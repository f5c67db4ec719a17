//! Show command implementation.

use super::{open_store, print_record, RecordView};
use crate::Format;
use std::path::Path;

/// Runs the show command.
pub fn run(path: &Path, id: &str, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let found = db.find(id)?;
    db.close()?;

    let Some(entry) = found else {
        return Err(format!("no record matches {id}").into());
    };
    let view = RecordView::from(entry.record());
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        Format::Text => print_record(&view),
    }
    Ok(())
}
