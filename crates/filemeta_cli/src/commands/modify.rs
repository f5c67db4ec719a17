//! Commands that change records.

use super::open_store;
use filemeta_core::Status;
use std::path::Path;

/// Removes every record under the id prefix.
pub fn remove(path: &Path, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let removed = db.remove(id)?;
    db.close()?;
    println!("Removed {removed} record(s)");
    Ok(())
}

/// Moves the first record matching `id` to `status`.
pub fn set_status(path: &Path, id: &str, status: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status: Status = status.parse()?;
    let db = open_store(path)?;
    let entry = db.set_status(id, status)?;
    db.close()?;
    println!("{} is now {}", entry.id, entry.status);
    Ok(())
}

/// Replaces the note of the first record matching `id`.
pub fn set_note(path: &Path, id: &str, note: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let entry = db.set_note(id, note)?;
    db.close()?;
    println!("Updated note of {}", entry.id);
    Ok(())
}
