//! End-to-end behaviour of the record store on disk.

use filemeta_core::{
    CoreError, FileDb, FileRecord, RecordPrefix, Status, StoreConfig, StoredRecord,
};
use tempfile::tempdir;
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[test]
fn group_change_scenario() {
    let temp = tempdir().unwrap();
    let db = FileDb::open(temp.path()).unwrap();
    let id = new_id();

    let record = FileRecord::new(id.as_str(), "/u/alice/doc/report.txt", Status::Received);
    db.insert(record.clone()).unwrap();

    let all = db.scan_all(|_| true).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].record(), &record);

    let mut entry = all.into_iter().next().unwrap();
    let old_path = entry.set_group(0, "projectA").unwrap();
    assert_eq!(old_path, "/u/alice/doc/report.txt");
    db.upsert(entry).unwrap();

    let all = db.scan_all(|_| true).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].path, "/u/alice/projectA/doc/report.txt");
    assert_eq!(all[0].groups.as_slice(), ["projectA"]);

    let old = RecordPrefix::StatusIdPath(Status::Received, id.clone(), old_path);
    assert!(db.find_first(&old).unwrap().is_none());
}

#[test]
fn find_first_follows_status_order() {
    let db = FileDb::open_in_memory();
    let id = new_id();
    for status in [Status::Deleted, Status::Approved, Status::Received] {
        db.insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", status))
            .unwrap();
    }

    let first = db.find(&id).unwrap().unwrap();
    assert_eq!(first.status, Status::Received);

    db.remove_by_prefix(&RecordPrefix::StatusId(Status::Received, id.clone()))
        .unwrap();
    assert_eq!(db.find(&id).unwrap().unwrap().status, Status::Approved);
}

#[test]
fn removal_is_isolated_to_the_prefix() {
    let db = FileDb::open_in_memory();
    let (a, b) = (new_id(), new_id());
    for status in [Status::Received, Status::Approved, Status::Deleted] {
        db.insert(FileRecord::new(a.as_str(), "/u/a/text/x.txt", status))
            .unwrap();
    }
    db.insert(FileRecord::new(b.as_str(), "/u/a/text/y.txt", Status::Received))
        .unwrap();

    assert_eq!(db.remove(&a).unwrap(), 3);
    let left = db.scan_all(|_| true).unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, b);
}

#[test]
fn minimum_prefix_guard() {
    let db = FileDb::open_in_memory();
    let id = new_id();
    db.insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", Status::Received))
        .unwrap();

    let err = db.remove(&id[..31]).unwrap_err();
    assert!(matches!(err, CoreError::PrefixTooShort { len: 31, min: 32 }));
    assert!(db.exists(&id).unwrap());

    let lenient = FileDb::open_in_memory_with_config(StoreConfig::new().min_id_prefix_len(4));
    lenient
        .insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", Status::Received))
        .unwrap();
    assert_eq!(lenient.remove(&id[..4]).unwrap(), 1);
}

#[test]
fn moves_survive_reopen() {
    let temp = tempdir().unwrap();
    let id = new_id();
    {
        let db = FileDb::open(temp.path()).unwrap();
        let mut entry = db
            .insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", Status::Received))
            .unwrap();
        entry.status = Status::Approved;
        entry.add_ref("order-17");
        db.upsert(entry).unwrap();
        db.close().unwrap();
    }

    let db = FileDb::open(temp.path()).unwrap();
    let all = db.scan_all(|_| true).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, Status::Approved);
    assert!(all[0].ref_by.contains("order-17"));
}

#[test]
fn compaction_on_disk_then_reopen() {
    let temp = tempdir().unwrap();
    let id = new_id();
    {
        let db = FileDb::open(temp.path()).unwrap();
        let mut entry = db
            .insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", Status::Received))
            .unwrap();
        for status in [Status::Applying, Status::Approved, Status::Rejected] {
            entry.status = status;
            entry = db.upsert(entry).unwrap();
        }
        let before = db.log_size().unwrap();
        let stats = db.compact().unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.bytes_before, before);
        assert!(stats.bytes_after < before);

        entry.set_note("after compaction");
        db.upsert(entry).unwrap();
    }

    let db = FileDb::open(temp.path()).unwrap();
    let entry = db.find(&id).unwrap().unwrap();
    assert_eq!(entry.status, Status::Rejected);
    assert_eq!(entry.note, "after compaction");
    assert_eq!(db.count().unwrap(), 1);
}

#[test]
fn open_twice_is_refused_until_drop() {
    let temp = tempdir().unwrap();
    let first = FileDb::open(temp.path()).unwrap();
    assert!(matches!(
        FileDb::open(temp.path()),
        Err(CoreError::StoreLocked { .. })
    ));
    drop(first);
    FileDb::open(temp.path()).unwrap();
}

#[test]
fn stale_snapshot_leaves_an_orphan() {
    // Two snapshots of one record: upserting both leaves the first write's
    // key behind, because the second snapshot never saw it.
    let db = FileDb::open_in_memory();
    let id = new_id();
    let entry = db
        .insert(FileRecord::new(id.as_str(), "/u/a/text/x.txt", Status::Received))
        .unwrap();

    let mut one = entry.clone();
    let mut two = entry;
    one.status = Status::Approved;
    two.status = Status::Rejected;
    db.upsert(one).unwrap();
    db.upsert(two).unwrap();

    let statuses: Vec<Status> = db
        .scan_prefix(&RecordPrefix::id(id.as_str()))
        .unwrap()
        .iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(statuses, [Status::Approved, Status::Rejected]);
}

#[test]
fn fresh_snapshot_has_no_previous_key() {
    let entry = StoredRecord::new(FileRecord::new(new_id(), "/u/a/text/x.txt", Status::Received));
    assert!(entry.previous_key().is_none());
}
