use rusqlite::Connection;
use rusqlite::types::Value;
use scdkit::core::db::{db_connect, initialize_entity_tables};
use scdkit::core::descriptor::{EntityDescriptor, FieldKind};
use scdkit::core::error::ScdError;
use scdkit::models::{Job, builtin_descriptors};
use scdkit::versioning::{
    Record, Versioned, VersionedTable, create_new_version, latest_version_view,
};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn test_db() -> (tempfile::TempDir, PathBuf, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("scd.db");
    let conn = db_connect(&path.to_string_lossy()).unwrap();
    initialize_entity_tables(&conn, &builtin_descriptors()).unwrap();
    (tmp, path, conn)
}

fn seed_job(conn: &Connection, desc: &EntityDescriptor, id: &str, status: &str, rate: f64) -> Job {
    let table = VersionedTable::bind(conn, desc).unwrap();
    let mut job = Job::new(id, status, rate);
    job.title = format!("{} title", id);
    job.company_id = "acme".to_string();
    job.contractor_id = "c1".to_string();
    table.create_initial(conn, job).unwrap()
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
        .unwrap()
}

#[test]
fn test_job1_end_to_end() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    let v1 = seed_job(&conn, &desc, "job1", "active", 100.0);
    assert_eq!(v1.version, 1);
    assert!(!v1.uid.is_empty());

    let v2: Job = create_new_version(&conn, &desc, "job1", |j: &mut Job| {
        j.status = "completed".to_string();
        j.rate = 150.0;
    })
    .unwrap();

    assert_eq!(v2.id, "job1");
    assert_eq!(v2.version, 2);
    assert_eq!(v2.status, "completed");
    assert_eq!(v2.rate, 150.0);
    assert_ne!(v2.uid, v1.uid);

    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let still_v1: Job = table.find_by_token(&conn, &v1.uid).unwrap().unwrap();
    assert_eq!(still_v1, v1);

    let latest: Job = table.find_latest(&conn, "job1").unwrap().unwrap();
    assert_eq!(latest, v2);
}

#[test]
fn test_n_versions_leave_one_row_at_n() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    seed_job(&conn, &desc, "job1", "active", 1.0);

    const N: i64 = 7;
    for i in 2..=N {
        let next: Job = create_new_version(&conn, &desc, "job1", |j: &mut Job| {
            j.rate = i as f64;
        })
        .unwrap();
        assert_eq!(next.version, i);
    }

    let at_n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM jobs WHERE id = 'job1' AND version = ?1",
            [N],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(at_n, 1);
    assert_eq!(row_count(&conn, "jobs"), N);

    let latest: Vec<Job> = latest_version_view(&desc)
        .filter_eq("id", "job1".to_string())
        .fetch(&conn)
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].version, N);
    assert_eq!(latest[0].rate, N as f64);

    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let history: Vec<Job> = table.history(&conn, "job1").unwrap();
    let versions: Vec<i64> = history.iter().map(|j| j.version).collect();
    assert_eq!(versions, (1..=N).collect::<Vec<_>>());
}

#[test]
fn test_latest_view_never_returns_two_rows_per_id() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    for (id, bumps) in [("job1", 3), ("job2", 0), ("job3", 5)] {
        seed_job(&conn, &desc, id, "active", 10.0);
        for _ in 0..bumps {
            let _: Job = create_new_version(&conn, &desc, id, |j: &mut Job| j.rate += 1.0).unwrap();
        }
    }

    let rows: Vec<Job> = latest_version_view(&desc).fetch(&conn).unwrap();
    let ids: Vec<&str> = rows.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["job1", "job2", "job3"]);
    let versions: Vec<i64> = rows.iter().map(|j| j.version).collect();
    assert_eq!(versions, vec![4, 1, 6]);

    // A predicate matching only older versions yields nothing for that id.
    let stale: Vec<Job> = latest_version_view(&desc)
        .filter_eq("rate", 10.0)
        .fetch(&conn)
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].id, "job2");
}

#[test]
fn test_new_version_of_missing_id_is_not_found() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    seed_job(&conn, &desc, "job1", "active", 100.0);
    let before = row_count(&conn, "jobs");

    let mut called = false;
    let err = create_new_version::<Job, _>(&conn, &desc, "ghost", |_| called = true).unwrap_err();

    assert!(matches!(err, ScdError::NotFound { ref entity, ref id } if entity == "Job" && id == "ghost"));
    assert!(!called);
    assert_eq!(row_count(&conn, "jobs"), before);
}

#[test]
fn test_concurrent_new_versions_one_conflicts() {
    let (_tmp, path, conn) = test_db();
    let desc = Job::descriptor();
    seed_job(&conn, &desc, "job1", "active", 100.0);

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|n| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            let desc = desc.clone();
            thread::spawn(move || {
                let conn = db_connect(&path.to_string_lossy()).unwrap();
                create_new_version::<Job, _>(&conn, &desc, "job1", |j| {
                    // Both writers have read version 1 before either inserts.
                    barrier.wait();
                    j.status = format!("writer-{}", n);
                })
            })
        })
        .collect();

    let results: Vec<Result<Job, ScdError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let ok: Vec<&Job> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(ScdError::ConflictOnInsert { version: 2, .. })))
        .count();
    assert_eq!(ok.len(), 1, "results: {:?}", results);
    assert_eq!(conflicts, 1, "results: {:?}", results);
    assert_eq!(ok[0].version, 2);

    let at_two: i64 = conn
        .query_row("SELECT COUNT(*) FROM jobs WHERE id = 'job1' AND version = 2", [], |r| r.get(0))
        .unwrap();
    assert_eq!(at_two, 1);
}

#[test]
fn test_mutating_versioning_fields_is_rejected() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    seed_job(&conn, &desc, "job1", "active", 100.0);

    let err = create_new_version::<Job, _>(&conn, &desc, "job1", |j| j.id = "job9".to_string())
        .unwrap_err();
    assert!(matches!(err, ScdError::MutationRejected { .. }));

    let err = create_new_version::<Job, _>(&conn, &desc, "job1", |j| j.version = 42).unwrap_err();
    assert!(matches!(err, ScdError::MutationRejected { .. }));

    let err = create_new_version::<Job, _>(&conn, &desc, "job1", |j| j.set_token("mine".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("minted by the runtime"));

    assert_eq!(row_count(&conn, "jobs"), 1);
}

#[test]
fn test_bind_requires_table_and_columns() {
    let tmp = tempdir().unwrap();
    let conn = db_connect(&tmp.path().join("bare.db").to_string_lossy()).unwrap();
    let desc = Job::descriptor();

    let err = VersionedTable::bind(&conn, &desc).unwrap_err();
    assert!(matches!(err, ScdError::CapabilityViolation { .. }));
    assert!(err.to_string().contains("does not exist"));

    conn.execute_batch("CREATE TABLE jobs (id TEXT, version INTEGER, status TEXT)")
        .unwrap();
    let err = VersionedTable::bind(&conn, &desc).unwrap_err();
    assert!(err.to_string().contains("has no column 'uid'"));
}

#[test]
fn test_descriptor_without_token_is_a_capability_violation() {
    let mut desc = Job::descriptor();
    desc.token = String::new();
    let err = VersionedTable::new(&desc).unwrap_err();
    assert!(matches!(err, ScdError::CapabilityViolation { .. }));
}

#[test]
fn test_empty_id_is_rejected() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let err = table.create_initial(&conn, Job::new("", "active", 1.0)).unwrap_err();
    assert!(matches!(err, ScdError::ValidationError(_)));
}

#[test]
fn test_record_entity_defined_in_config() {
    let tmp = tempdir().unwrap();
    let conn = db_connect(&tmp.path().join("scd.db").to_string_lossy()).unwrap();
    let mut desc = EntityDescriptor::new("Invoice", "invoices")
        .field("total", FieldKind::Real)
        .field("state", FieldKind::Text);
    desc.identity = "invoice_no".to_string();
    desc.token = "row_token".to_string();
    initialize_entity_tables(&conn, std::slice::from_ref(&desc)).unwrap();

    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let first = table
        .create_initial(
            &conn,
            Record::draft("INV-1")
                .with("total", 12.5)
                .with("state", "draft".to_string()),
        )
        .unwrap();

    let second: Record = table
        .create_new_version(&conn, "INV-1", |r: &mut Record| {
            r.set("state", "sent".to_string())
        })
        .unwrap();

    assert_eq!(second.version, 2);
    assert_ne!(second.token, first.token);
    assert_eq!(second.get("total"), Some(&Value::Real(12.5)));
    assert_eq!(second.get("state"), Some(&Value::Text("sent".to_string())));

    let json = second.to_json(&desc);
    assert_eq!(json["invoice_no"], "INV-1");
    assert_eq!(json["version"], 2);
    assert_eq!(json["state"], "sent");
}

#[test]
fn test_undeclared_record_field_is_a_capability_violation() {
    let (_tmp, _path, conn) = test_db();
    let desc = Job::descriptor();
    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let err = table
        .create_initial(&conn, Record::draft("job1").with("colour", "red".to_string()))
        .unwrap_err();
    assert!(matches!(err, ScdError::CapabilityViolation { .. }));
    assert_eq!(row_count(&conn, "jobs"), 0);
}
