use crate::core::descriptor::{EntityDescriptor, FieldKind};
use crate::versioning::entity::Entity;
use crate::versioned_entity;
use rusqlite::Row;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLineItem {
    pub id: String,
    pub version: i64,
    pub uid: String,
    pub job_uid: String,
    pub timelog_uid: String,
    pub amount: f64,
    pub status: String,
}

versioned_entity!(PaymentLineItem { id: id, version: version, token: uid });

impl PaymentLineItem {
    pub fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new("PaymentLineItem", "payment_line_items")
            .reference("job_uid", "Job")
            .reference("timelog_uid", "Timelog")
            .field("amount", FieldKind::Real)
            .field("status", FieldKind::Text)
            .require_all()
    }
}

impl Entity for PaymentLineItem {
    fn from_row(_desc: &EntityDescriptor, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            version: row.get("version")?,
            uid: row.get("uid")?,
            job_uid: row.get("job_uid")?,
            timelog_uid: row.get("timelog_uid")?,
            amount: row.get("amount")?,
            status: row.get("status")?,
        })
    }

    fn domain_values(&self) -> Vec<(String, Value)> {
        vec![
            ("job_uid".to_string(), Value::Text(self.job_uid.clone())),
            ("timelog_uid".to_string(), Value::Text(self.timelog_uid.clone())),
            ("amount".to_string(), Value::Real(self.amount)),
            ("status".to_string(), Value::Text(self.status.clone())),
        ]
    }
}
