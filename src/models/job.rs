use crate::core::descriptor::{EntityDescriptor, FieldKind};
use crate::versioning::entity::Entity;
use crate::versioned_entity;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub version: i64,
    pub uid: String,
    pub status: String,
    pub rate: f64,
    pub title: String,
    pub company_id: String,
    pub contractor_id: String,
}

versioned_entity!(Job { id: id, version: version, token: uid });

impl Job {
    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("Job", "jobs")
            .field("status", FieldKind::Text)
            .field("rate", FieldKind::Real)
            .field("title", FieldKind::Text)
            .field("company_id", FieldKind::Text)
            .field("contractor_id", FieldKind::Text)
            .require_all()
    }

    /// Unpersisted job; version and uid are assigned when it is stored.
    pub fn new(id: &str, status: &str, rate: f64) -> Self {
        Self {
            id: id.to_string(),
            version: 0,
            uid: String::new(),
            status: status.to_string(),
            rate,
            title: String::new(),
            company_id: String::new(),
            contractor_id: String::new(),
        }
    }
}

impl Entity for Job {
    fn from_row(_desc: &EntityDescriptor, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            version: row.get("version")?,
            uid: row.get("uid")?,
            status: row.get("status")?,
            rate: row.get("rate")?,
            title: row.get("title")?,
            company_id: row.get("company_id")?,
            contractor_id: row.get("contractor_id")?,
        })
    }

    fn domain_values(&self) -> Vec<(String, Value)> {
        vec![
            ("status".to_string(), Value::Text(self.status.clone())),
            ("rate".to_string(), Value::Real(self.rate)),
            ("title".to_string(), Value::Text(self.title.clone())),
            ("company_id".to_string(), Value::Text(self.company_id.clone())),
            ("contractor_id".to_string(), Value::Text(self.contractor_id.clone())),
        ]
    }
}
