//! Inspect command implementation.

use super::open_store;
use crate::Format;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Log size in bytes.
    pub log_size: u64,
    /// Number of stored records.
    pub record_count: usize,
    /// Records per status, in lookup order.
    pub statuses: Vec<StatusCount>,
}

/// Number of records in one status.
#[derive(Debug, Serialize)]
pub struct StatusCount {
    /// Status name.
    pub status: String,
    /// Records in it.
    pub count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let result = InspectResult {
        path: path.display().to_string(),
        log_size: db.log_size()?,
        record_count: db.count()?,
        statuses: db
            .status_counts()?
            .into_iter()
            .map(|(status, count)| StatusCount {
                status: status.to_string(),
                count,
            })
            .collect(),
    };
    db.close()?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("  Log size: {} bytes", result.log_size);
    println!("  Records:  {}", result.record_count);
    println!();
    println!("By status:");
    for entry in &result.statuses {
        println!("  {:<10} {}", entry.status, entry.count);
    }
}
