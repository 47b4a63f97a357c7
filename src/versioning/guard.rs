//! Write-path wrapper that turns in-place updates into new versions.
//!
//! Rows are immutable; the table trigger aborts any raw `UPDATE`. Callers that
//! hold a modified copy of a row go through [`UpdateGuard::update`], which
//! re-issues the change as a new version and says so in its outcome.

use crate::core::error::ScdError;
use crate::versioning::entity::Entity;
use crate::versioning::runtime::VersionedTable;
use rusqlite::Connection;

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// A brand new id was stored at version 1.
    Inserted(T),
    /// The requested in-place update did not happen; `record` was persisted as
    /// the next version instead. The row identified by `superseded_token` is unchanged.
    Redirected { superseded_token: String, record: T },
}

impl<T> WriteOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            WriteOutcome::Inserted(r) => r,
            WriteOutcome::Redirected { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            WriteOutcome::Inserted(r) => r,
            WriteOutcome::Redirected { record, .. } => record,
        }
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self, WriteOutcome::Redirected { .. })
    }
}

pub struct UpdateGuard<'c, 'd> {
    conn: &'c Connection,
    table: VersionedTable<'d>,
}

impl<'c, 'd> UpdateGuard<'c, 'd> {
    pub fn new(conn: &'c Connection, table: VersionedTable<'d>) -> Self {
        Self { conn, table }
    }

    pub fn insert<T: Entity>(&self, record: T) -> Result<WriteOutcome<T>, ScdError> {
        self.table
            .create_initial(self.conn, record)
            .map(WriteOutcome::Inserted)
    }

    /// Intercepts an update of the row whose token is `modified.token()`.
    ///
    /// The domain values of `modified` are carried onto a new version of that
    /// row's id. If the row was already superseded, the new version still
    /// follows the id's current maximum.
    pub fn update<T: Entity>(&self, modified: &T) -> Result<WriteOutcome<T>, ScdError> {
        let desc = self.table.descriptor();
        let original: T = self
            .table
            .find_by_token(self.conn, modified.token())?
            .ok_or_else(|| {
                ScdError::not_found(&desc.name, &format!("{}={}", desc.token, modified.token()))
            })?;

        tracing::debug!(
            entity = %desc.name,
            id = original.id(),
            token = original.token(),
            "in-place update redirected to a new version"
        );

        let record = self
            .table
            .create_new_version(self.conn, original.id(), |next: &mut T| {
                let (version, token) = (next.version(), next.token().to_string());
                *next = modified.clone();
                next.set_version(version);
                next.set_token(token);
            })?;

        Ok(WriteOutcome::Redirected {
            superseded_token: original.token().to_string(),
            record,
        })
    }

    pub fn reset(&self) -> Result<usize, ScdError> {
        self.table.reset(self.conn)
    }
}
