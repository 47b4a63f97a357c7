//! Latest-version resolution and new-version creation.
//!
//! Everything here runs on the caller's connection and thread. Nothing retries
//! and nothing locks: two writers racing for the same next version are settled
//! by the table's `(id, version)` primary key and unique token, and the loser
//! gets [`ScdError::ConflictOnInsert`].

use crate::core::db;
use crate::core::descriptor::EntityDescriptor;
use crate::core::error::ScdError;
use crate::core::time;
use crate::versioning::entity::Entity;
use crate::versioning::view::LatestView;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

/// A descriptor that has passed the capability checks, ready to read and write rows.
#[derive(Debug, Clone, Copy)]
pub struct VersionedTable<'d> {
    desc: &'d EntityDescriptor,
}

impl<'d> VersionedTable<'d> {
    /// Checks the descriptor only.
    pub fn new(desc: &'d EntityDescriptor) -> Result<Self, ScdError> {
        desc.validate()?;
        Ok(Self { desc })
    }

    /// Checks the descriptor and that the physical table exposes every column it names.
    pub fn bind(conn: &Connection, desc: &'d EntityDescriptor) -> Result<Self, ScdError> {
        desc.validate()?;
        let physical = db::table_columns(conn, &desc.table)?;
        if physical.is_empty() {
            return Err(ScdError::capability(
                &desc.name,
                format!("table '{}' does not exist", desc.table),
            ));
        }
        if let Some(missing) = desc.columns().into_iter().find(|c| !physical.contains(*c)) {
            return Err(ScdError::capability(
                &desc.name,
                format!("table '{}' has no column '{}'", desc.table, missing),
            ));
        }
        Ok(Self { desc })
    }

    pub fn descriptor(&self) -> &'d EntityDescriptor {
        self.desc
    }

    pub fn latest_view(&self) -> LatestView<'d> {
        LatestView::new(self.desc)
    }

    fn select_columns(&self) -> String {
        self.desc.columns().join(", ")
    }

    /// Point lookup of the row with the highest version for `id`.
    pub fn find_latest<T: Entity>(&self, conn: &Connection, id: &str) -> Result<Option<T>, ScdError> {
        let d = self.desc;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {} DESC LIMIT 1",
            self.select_columns(),
            d.table,
            d.identity,
            d.version
        );
        let row = conn
            .query_row(&sql, params![id], |row| T::from_row(d, row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_token<T: Entity>(
        &self,
        conn: &Connection,
        token: &str,
    ) -> Result<Option<T>, ScdError> {
        let d = self.desc;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.select_columns(),
            d.table,
            d.token
        );
        let row = conn
            .query_row(&sql, params![token], |row| T::from_row(d, row))
            .optional()?;
        Ok(row)
    }

    /// Every persisted version of `id`, oldest first.
    pub fn history<T: Entity>(&self, conn: &Connection, id: &str) -> Result<Vec<T>, ScdError> {
        let d = self.desc;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY {} ASC",
            self.select_columns(),
            d.table,
            d.identity,
            d.version
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![id], |row| T::from_row(d, row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Persists version 1 of a new id under a freshly minted token.
    pub fn create_initial<T: Entity>(&self, conn: &Connection, mut record: T) -> Result<T, ScdError> {
        if record.id().is_empty() {
            return Err(ScdError::ValidationError(format!(
                "{} id must not be empty",
                self.desc.name
            )));
        }
        record.set_version(1);
        record.set_token(time::new_version_token());
        self.insert(conn, &record)?;
        tracing::debug!(entity = %self.desc.name, id = record.id(), token = record.token(), "created initial version");
        Ok(record)
    }

    /// Copies the latest row of `id`, mints a new token, bumps the version by one,
    /// lets `mutate` change domain fields, and inserts the result.
    pub fn create_new_version<T, F>(&self, conn: &Connection, id: &str, mutate: F) -> Result<T, ScdError>
    where
        T: Entity,
        F: FnOnce(&mut T),
    {
        let d = self.desc;
        let prior: T = self
            .find_latest(conn, id)?
            .ok_or_else(|| ScdError::not_found(&d.name, id))?;

        let mut next = prior.clone();
        let next_version = prior.version() + 1;
        let token = time::new_version_token();
        next.set_token(token.clone());
        next.set_version(next_version);

        mutate(&mut next);

        let reject = |reason: String| ScdError::MutationRejected {
            entity: d.name.clone(),
            id: id.to_string(),
            reason,
        };
        if next.id() != prior.id() {
            return Err(reject(format!(
                "{} changed from '{}' to '{}'",
                d.identity,
                prior.id(),
                next.id()
            )));
        }
        if next.version() != next_version {
            return Err(reject(format!(
                "{} must be {}, mutate set {}",
                d.version,
                next_version,
                next.version()
            )));
        }
        if next.token() != token {
            return Err(reject(format!("{} is minted by the runtime", d.token)));
        }

        self.insert(conn, &next)?;
        tracing::debug!(
            entity = %d.name,
            id,
            version = next_version,
            token = next.token(),
            superseded = prior.token(),
            "created new version"
        );
        Ok(next)
    }

    fn insert<T: Entity>(&self, conn: &Connection, record: &T) -> Result<(), ScdError> {
        let d = self.desc;
        let mut columns: Vec<String> = vec![d.identity.clone(), d.version.clone(), d.token.clone()];
        let mut values: Vec<Value> = vec![
            Value::Text(record.id().to_string()),
            Value::Integer(record.version()),
            Value::Text(record.token().to_string()),
        ];
        for (column, value) in record.domain_values() {
            if d.find_field(&column).is_none() {
                return Err(ScdError::capability(
                    &d.name,
                    format!("entity exposes field '{}' the descriptor does not declare", column),
                ));
            }
            columns.push(column);
            values.push(value);
        }
        for field in d.fields.iter().filter(|f| f.required) {
            let present = columns
                .iter()
                .zip(&values)
                .any(|(c, v)| *c == field.name && *v != Value::Null);
            if !present {
                return Err(ScdError::ValidationError(format!(
                    "{} '{}': required field '{}' has no value",
                    d.name,
                    record.id(),
                    field.name
                )));
            }
        }

        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            d.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        conn.execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| {
                if db::is_uniqueness_violation(&e) {
                    ScdError::ConflictOnInsert {
                        entity: d.name.clone(),
                        id: record.id().to_string(),
                        version: record.version(),
                        detail: e.to_string(),
                    }
                } else {
                    ScdError::RusqliteError(e)
                }
            })?;
        Ok(())
    }

    /// Full dataset reset: the one path that removes rows. Returns the number deleted.
    pub fn reset(&self, conn: &Connection) -> Result<usize, ScdError> {
        let removed = conn.execute(&format!("DELETE FROM {}", self.desc.table), [])?;
        tracing::info!(entity = %self.desc.name, removed, "reset entity table");
        Ok(removed)
    }
}

/// The latest-version view of an entity type.
pub fn latest_version_view(desc: &EntityDescriptor) -> LatestView<'_> {
    LatestView::new(desc)
}

/// Creates the next version of `id`. See [`VersionedTable::create_new_version`].
pub fn create_new_version<T, F>(
    conn: &Connection,
    desc: &EntityDescriptor,
    id: &str,
    mutate: F,
) -> Result<T, ScdError>
where
    T: Entity,
    F: FnOnce(&mut T),
{
    VersionedTable::new(desc)?.create_new_version(conn, id, mutate)
}
