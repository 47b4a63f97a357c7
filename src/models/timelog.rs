use crate::core::descriptor::{EntityDescriptor, FieldKind};
use crate::versioning::entity::Entity;
use crate::versioned_entity;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// Hours logged against one specific job version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timelog {
    pub id: String,
    pub version: i64,
    pub uid: String,
    pub duration: f64,
    /// Epoch seconds.
    pub time_start: i64,
    /// Epoch seconds.
    pub time_end: i64,
    /// Stored in the `type` column.
    pub log_type: String,
    /// Token of the job version this log belongs to.
    pub job_uid: String,
}

versioned_entity!(Timelog { id: id, version: version, token: uid });

impl Timelog {
    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Timelog", "timelogs")
            .field("duration", FieldKind::Real)
            .field("time_start", FieldKind::Timestamp)
            .field("time_end", FieldKind::Timestamp)
            .field("type", FieldKind::Text)
            .reference("job_uid", "Job")
            .require_all()
    }
}

impl Entity for Timelog {
    fn from_row(_desc: &EntityDescriptor, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            version: row.get("version")?,
            uid: row.get("uid")?,
            duration: row.get("duration")?,
            time_start: row.get("time_start")?,
            time_end: row.get("time_end")?,
            log_type: row.get("type")?,
            job_uid: row.get("job_uid")?,
        })
    }

    fn domain_values(&self) -> Vec<(String, Value)> {
        vec![
            ("duration".to_string(), Value::Real(self.duration)),
            ("time_start".to_string(), Value::Integer(self.time_start)),
            ("time_end".to_string(), Value::Integer(self.time_end)),
            ("type".to_string(), Value::Text(self.log_type.clone())),
            ("job_uid".to_string(), Value::Text(self.job_uid.clone())),
        ]
    }
}
