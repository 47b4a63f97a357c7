use crate::core::db;
use crate::core::error;
use crate::core::store::Store;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The DB Broker is the single door CLI operations use to reach storage.
///
/// It opens a connection, runs the operation, and appends one audit event per
/// operation. It does not serialize callers: racing writers are arbitrated by
/// the table constraints, not by the broker.
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub entity: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl DbBroker {
    pub fn new(store: &Store) -> Self {
        Self {
            db_path: store.db_path(),
            audit_log_path: store.audit_log_path(),
        }
    }

    /// Execute a closure with a fresh connection to the store database.
    ///
    /// The closure's result is returned as-is; a failed audit append is only logged.
    pub fn with_conn<F, R>(
        &self,
        actor: &str,
        op_name: &str,
        entity: &str,
        f: F,
    ) -> Result<R, error::ScdError>
    where
        F: FnOnce(&Connection) -> Result<R, error::ScdError>,
    {
        let conn = db::db_connect(&self.db_path.to_string_lossy())?;

        let result = f(&conn);

        let (status, error_kind) = match &result {
            Ok(_) => ("success", None),
            Err(e) => ("error", Some(e.kind().to_string())),
        };
        tracing::debug!(op = op_name, entity, status, "broker operation");
        if let Err(e) = self.log_event(actor, op_name, entity, status, error_kind) {
            tracing::warn!(op = op_name, entity, error = %e, "audit log append failed");
        }

        result
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        entity: &str,
        status: &str,
        error_kind: Option<String>,
    ) -> Result<(), error::ScdError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            entity: entity.to_string(),
            status: status.to_string(),
            error_kind,
        };

        let line = serde_json::to_string(&ev).map_err(|e| {
            error::ScdError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::ScdError::IoError)?;

        writeln!(f, "{}", line).map_err(error::ScdError::IoError)?;
        Ok(())
    }
}

/// Reads the audit log back, oldest first. A missing log is an empty log.
pub fn read_events(store: &Store) -> Result<Vec<BrokerEvent>, error::ScdError> {
    let path = store.audit_log_path();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l).map_err(|e| {
                error::ScdError::ValidationError(format!(
                    "Corrupt audit event in {}: {}",
                    path.display(),
                    e
                ))
            })
        })
        .collect()
}
