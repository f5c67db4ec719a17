//! List command implementation.

use super::{open_store, print_record, RecordView};
use crate::Format;
use filemeta_core::{FileType, Status, StoredRecord};
use std::path::Path;

/// Filters accepted by `list`.
#[derive(Debug, Default)]
pub struct ListFilter {
    /// Status name.
    pub status: Option<String>,
    /// File type name.
    pub file_type: Option<String>,
    /// Leading groups.
    pub groups: Vec<String>,
}

/// Runs the list command.
pub fn run(path: &Path, filter: &ListFilter, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let records = select(&db, filter)?;
    db.close()?;

    let views: Vec<RecordView> = records.iter().map(|r| RecordView::from(r.record())).collect();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&views)?),
        Format::Text => {
            for view in &views {
                print_record(view);
            }
            println!("{} record(s)", views.len());
        }
    }
    Ok(())
}

/// Applies `filter`, using a status prefix scan when a status is given.
pub fn select(
    db: &filemeta_core::FileDb,
    filter: &ListFilter,
) -> Result<Vec<StoredRecord>, Box<dyn std::error::Error>> {
    let file_type = filter
        .file_type
        .as_deref()
        .map(str::parse::<FileType>)
        .transpose()?;
    let groups: Vec<&str> = filter.groups.iter().map(String::as_str).collect();

    let records = match filter.status.as_deref() {
        Some(name) => {
            let status: Status = name.parse()?;
            db.scan_status(status)?
                .into_iter()
                .filter(|r| {
                    file_type.is_none_or(|t| r.file_type() == Some(t))
                        && r.groups.starts_with(groups.as_slice())
                })
                .collect()
        }
        None => db.search(file_type, &groups)?,
    };
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filemeta_core::{FileDb, FileRecord};

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn db() -> FileDb {
        let db = FileDb::open_in_memory();
        let mut a = FileRecord::new(A, "/u/a/image/a.png", Status::Approved);
        a.set_group(0, "trip").unwrap();
        db.insert(a).unwrap();
        db.insert(FileRecord::new(B, "/u/a/text/b.txt", Status::Received))
            .unwrap();
        db
    }

    #[test]
    fn filters_combine() {
        let db = db();
        assert_eq!(select(&db, &ListFilter::default()).unwrap().len(), 2);

        let by_status = ListFilter {
            status: Some("received".into()),
            ..ListFilter::default()
        };
        let hits = select(&db, &by_status).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, B);

        let by_group = ListFilter {
            file_type: Some("image".into()),
            groups: vec!["trip".into()],
            ..ListFilter::default()
        };
        assert_eq!(select(&db, &by_group).unwrap()[0].id, A);
    }

    #[test]
    fn unknown_names_are_errors() {
        let db = db();
        let bad = ListFilter {
            status: Some("archived".into()),
            ..ListFilter::default()
        };
        assert!(select(&db, &bad).is_err());
        let bad = ListFilter {
            file_type: Some("spreadsheet".into()),
            ..ListFilter::default()
        };
        assert!(select(&db, &bad).is_err());
    }

    #[test]
    fn view_serializes_type_field() {
        let db = db();
        let record = db.find(A).unwrap().unwrap();
        let json = serde_json::to_value(RecordView::from(record.record())).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["media_type"], "image/png");
        assert_eq!(json["groups"][0], "trip");
    }
}
