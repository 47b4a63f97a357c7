use crate::core::descriptor::{EntityDescriptor, FieldKind};
use crate::core::error;
use rusqlite::{Connection, ErrorCode, ffi};
use std::collections::HashSet;

/// Busy timeout applied to every connection, so a writer racing another writer
/// waits for the lock and then observes the constraint outcome.
const BUSY_TIMEOUT_SECS: u64 = 5;

pub fn db_connect(db_path: &str) -> Result<Connection, error::ScdError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(BUSY_TIMEOUT_SECS))
        .map_err(error::ScdError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::ScdError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::ScdError::RusqliteError)?;
    Ok(conn)
}

/// DDL for one versioned entity table: composite primary key on (identity,
/// version), unique token, positive versions, `NOT NULL` required fields, token
/// foreign keys for reference fields, and a trigger that aborts every in-place UPDATE.
pub fn entity_schema(desc: &EntityDescriptor, all: &[EntityDescriptor]) -> Vec<String> {
    let mut cols = vec![
        format!("{} TEXT NOT NULL", desc.identity),
        format!(
            "{} INTEGER NOT NULL CHECK ({} > 0)",
            desc.version, desc.version
        ),
        format!("{} TEXT NOT NULL UNIQUE", desc.token),
    ];
    let mut foreign_keys = Vec::new();
    for field in &desc.fields {
        let null = if field.required { " NOT NULL" } else { "" };
        cols.push(format!("{} {}{}", field.name, field.kind.sql_type(), null));
        if field.kind == FieldKind::Reference
            && let Some(target) = field
                .references
                .as_deref()
                .and_then(|r| all.iter().find(|d| d.name == r))
        {
            foreign_keys.push(format!(
                "FOREIGN KEY({}) REFERENCES {}({})",
                field.name, target.table, target.token
            ));
        }
    }
    cols.push(format!("PRIMARY KEY ({}, {})", desc.identity, desc.version));
    cols.extend(foreign_keys);

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            desc.table,
            cols.join(",\n    ")
        ),
        format!(
            "CREATE TRIGGER IF NOT EXISTS {table}_immutable BEFORE UPDATE ON {table}
             BEGIN
                 SELECT RAISE(ABORT, '{table} rows are immutable; create a new version instead');
             END",
            table = desc.table
        ),
    ]
}

/// Creates every entity table in dependency-safe order (declared order; references
/// to later entities are resolved by SQLite lazily).
pub fn initialize_entity_tables(
    conn: &Connection,
    descriptors: &[EntityDescriptor],
) -> Result<(), error::ScdError> {
    for desc in descriptors {
        for stmt in entity_schema(desc, descriptors) {
            conn.execute_batch(&stmt)?;
        }
    }
    Ok(())
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, error::ScdError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(cols)
}

/// Uniqueness conflicts (primary key or UNIQUE). Foreign-key and CHECK failures are
/// constraint violations too but are not conflicts between writers.
pub fn is_uniqueness_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}
