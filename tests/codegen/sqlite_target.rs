use rusqlite::{Connection, named_params};
use scdkit::codegen::targets::sqlite::{render_latest_version_query, render_new_version_operation};
use scdkit::core::db::{db_connect, initialize_entity_tables, is_uniqueness_violation};
use scdkit::core::time::new_version_token;
use scdkit::models::{Job, builtin_descriptors};
use scdkit::versioning::{UpdateGuard, VersionedTable};
use tempfile::tempdir;

fn seeded() -> (tempfile::TempDir, Connection, String) {
    let tmp = tempdir().unwrap();
    let conn = db_connect(&tmp.path().join("scd.db").to_string_lossy()).unwrap();
    initialize_entity_tables(&conn, &builtin_descriptors()).unwrap();

    let desc = Job::descriptor();
    let guard = UpdateGuard::new(&conn, VersionedTable::bind(&conn, &desc).unwrap());
    let mut job = Job::new("job1", "active", 100.0);
    job.title = "Roofing".to_string();
    job.company_id = "acme".to_string();
    job.contractor_id = "c1".to_string();
    let v1 = guard.insert(job).unwrap().into_record();
    guard.insert(Job::new("job2", "active", 80.0)).unwrap();

    conn.execute_batch(&render_latest_version_query(&desc)).unwrap();
    (tmp, conn, v1.uid)
}

#[test]
fn test_generated_insert_creates_next_version() {
    let (_tmp, conn, v1_uid) = seeded();
    let insert = render_new_version_operation(&Job::descriptor());
    let token = new_version_token();

    let changed = conn
        .execute(
            insert.trim(),
            named_params! {
                ":id": "job1",
                ":uid": token,
                ":status": "completed",
                ":rate": 150.0,
            },
        )
        .unwrap();
    assert_eq!(changed, 1);

    let (version, uid, status, rate, title): (i64, String, String, f64, String) = conn
        .query_row(
            "SELECT version, uid, status, rate, title FROM jobs_latest WHERE id = 'job1'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .unwrap();
    assert_eq!(version, 2);
    assert_eq!(uid, token);
    assert_ne!(uid, v1_uid);
    assert_eq!(status, "completed");
    assert_eq!(rate, 150.0);
    // Unbound parameters are NULL and keep the prior value.
    assert_eq!(title, "Roofing");
}

#[test]
fn test_generated_view_has_one_row_per_id() {
    let (_tmp, conn, _) = seeded();
    let insert = render_new_version_operation(&Job::descriptor());
    for _ in 0..3 {
        conn.execute(
            insert.trim(),
            named_params! { ":id": "job2", ":uid": new_version_token() },
        )
        .unwrap();
    }

    let rows: Vec<(String, i64)> = {
        let mut stmt = conn
            .prepare("SELECT id, version FROM jobs_latest ORDER BY id")
            .unwrap();
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    };
    assert_eq!(rows, vec![("job1".to_string(), 1), ("job2".to_string(), 4)]);

    let active_for_acme: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM jobs_latest WHERE status = 'active' AND company_id = 'acme'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(active_for_acme, 1);
}

#[test]
fn test_generated_insert_for_missing_id_changes_nothing() {
    let (_tmp, conn, _) = seeded();
    let insert = render_new_version_operation(&Job::descriptor());
    let changed = conn
        .execute(
            insert.trim(),
            named_params! { ":id": "ghost", ":uid": new_version_token() },
        )
        .unwrap();
    assert_eq!(changed, 0);
}

#[test]
fn test_generated_insert_conflicts_on_reused_token() {
    let (_tmp, conn, v1_uid) = seeded();
    let insert = render_new_version_operation(&Job::descriptor());
    let err = conn
        .execute(
            insert.trim(),
            named_params! { ":id": "job1", ":uid": v1_uid },
        )
        .unwrap_err();
    assert!(is_uniqueness_violation(&err));
}
