use rusqlite::Connection;
use scdkit::core::db::{db_connect, initialize_entity_tables};
use scdkit::core::error::ScdError;
use scdkit::models::{Job, builtin_descriptors};
use scdkit::versioning::{UpdateGuard, VersionedTable, WriteOutcome};
use tempfile::tempdir;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let conn = db_connect(&tmp.path().join("scd.db").to_string_lossy()).unwrap();
    initialize_entity_tables(&conn, &builtin_descriptors()).unwrap();
    (tmp, conn)
}

fn active_job(id: &str) -> Job {
    let mut job = Job::new(id, "active", 100.0);
    job.title = "Fence repair".to_string();
    job.company_id = "acme".to_string();
    job.contractor_id = "c1".to_string();
    job
}

#[test]
fn test_insert_assigns_version_one() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());

    let outcome = guard.insert(active_job("job1")).unwrap();
    assert!(!outcome.is_redirected());
    let job = outcome.into_record();
    assert_eq!(job.version, 1);
    assert_eq!(job.uid.len(), 26);
}

#[test]
fn test_update_is_redirected_to_new_version() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let table = VersionedTable::bind(&conn, &desc).unwrap();
    let guard = UpdateGuard::new(&conn, table);

    let v1 = guard.insert(active_job("job1")).unwrap().into_record();
    let mut edited = v1.clone();
    edited.status = "completed".to_string();
    edited.rate = 150.0;

    let outcome = guard.update(&edited).unwrap();
    match &outcome {
        WriteOutcome::Redirected {
            superseded_token,
            record,
        } => {
            assert_eq!(superseded_token, &v1.uid);
            assert_eq!(record.version, 2);
            assert_eq!(record.status, "completed");
            assert_eq!(record.rate, 150.0);
            assert_ne!(record.uid, v1.uid);
        }
        other => panic!("expected redirect, got {:?}", other),
    }

    let original: Job = table.find_by_token(&conn, &v1.uid).unwrap().unwrap();
    assert_eq!(original, v1);
}

#[test]
fn test_update_of_superseded_row_follows_current_max() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());

    let v1 = guard.insert(active_job("job1")).unwrap().into_record();
    let mut first = v1.clone();
    first.rate = 110.0;
    guard.update(&first).unwrap();

    // Still holding the version 1 copy.
    let mut stale = v1.clone();
    stale.rate = 120.0;
    let v3 = guard.update(&stale).unwrap().into_record();
    assert_eq!(v3.version, 3);
    assert_eq!(v3.rate, 120.0);
}

#[test]
fn test_update_with_unknown_token_is_not_found() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());

    let mut ghost = active_job("job1");
    ghost.uid = "01HZZZZZZZZZZZZZZZZZZZZZZZ".to_string();
    let err = guard.update(&ghost).unwrap_err();
    assert!(matches!(err, ScdError::NotFound { .. }));
    assert!(err.to_string().contains("uid=01HZZZZZZZZZZZZZZZZZZZZZZZ"));
}

#[test]
fn test_raw_update_is_aborted_by_store() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());
    guard.insert(active_job("job1")).unwrap();

    let err = conn
        .execute("UPDATE jobs SET status = 'completed' WHERE id = 'job1'", [])
        .unwrap_err();
    assert!(err.to_string().contains("immutable"));

    let status: String = conn
        .query_row("SELECT status FROM jobs WHERE id = 'job1'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(status, "active");
}

#[test]
fn test_reset_is_the_only_delete() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());
    let v1 = guard.insert(active_job("job1")).unwrap().into_record();
    guard.update(&v1).unwrap();
    guard.insert(active_job("job2")).unwrap();

    assert_eq!(guard.reset().unwrap(), 3);
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_duplicate_initial_insert_conflicts() {
    let (_tmp, conn) = test_db();
    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());
    guard.insert(active_job("job1")).unwrap();

    let err = guard.insert(active_job("job1")).unwrap_err();
    assert!(matches!(
        err,
        ScdError::ConflictOnInsert { ref id, version: 1, .. } if id == "job1"
    ));
}
