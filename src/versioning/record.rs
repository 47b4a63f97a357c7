//! Descriptor-driven record for entities known only from configuration.

use crate::core::descriptor::{EntityDescriptor, FieldKind};
use crate::core::error::ScdError;
use crate::versioning::entity::{Entity, Versioned};
use rusqlite::Row;
use rusqlite::types::Value;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub version: i64,
    pub token: String,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// A not-yet-persisted record; version and token are assigned on insert.
    pub fn draft(id: &str) -> Self {
        Self {
            id: id.to_string(),
            version: 0,
            token: String::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Parses `column=value` assignments, typing each value by its field kind.
    /// The literal `null` clears a field.
    pub fn apply_assignments(
        &mut self,
        desc: &EntityDescriptor,
        assignments: &[String],
    ) -> Result<(), ScdError> {
        for assignment in assignments {
            let (name, raw) = assignment.split_once('=').ok_or_else(|| {
                ScdError::ValidationError(format!(
                    "Expected column=value, got '{}'",
                    assignment
                ))
            })?;
            let name = name.trim();
            let field = desc.find_field(name).ok_or_else(|| {
                ScdError::ValidationError(format!(
                    "{} has no domain field '{}' (versioning fields cannot be assigned)",
                    desc.name, name
                ))
            })?;
            let value = parse_value(field.kind, raw).map_err(|reason| {
                ScdError::ValidationError(format!(
                    "{}.{}: {}",
                    desc.name, name, reason
                ))
            })?;
            self.fields.insert(name.to_string(), value);
        }
        Ok(())
    }

    pub fn to_json(&self, desc: &EntityDescriptor) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(desc.identity.clone(), json!(self.id));
        obj.insert(desc.version.clone(), json!(self.version));
        obj.insert(desc.token.clone(), json!(self.token));
        for field in &desc.fields {
            let v = self.fields.get(&field.name).unwrap_or(&Value::Null);
            obj.insert(field.name.clone(), value_to_json(v));
        }
        serde_json::Value::Object(obj)
    }
}

fn parse_value(kind: FieldKind, raw: &str) -> Result<Value, String> {
    if raw == "null" {
        return Ok(Value::Null);
    }
    match kind {
        FieldKind::Text | FieldKind::Reference => Ok(Value::Text(raw.to_string())),
        FieldKind::Integer | FieldKind::Timestamp => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| format!("'{}' is not an integer ({})", raw, e)),
        FieldKind::Real => raw
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|e| format!("'{}' is not a number ({})", raw, e)),
    }
}

pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Real(f) => json!(f),
        Value::Text(s) => json!(s),
        Value::Blob(b) => json!(b),
    }
}

impl Versioned for Record {
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        self.version
    }
    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
    fn token(&self) -> &str {
        &self.token
    }
    fn set_token(&mut self, token: String) {
        self.token = token;
    }
}

impl Entity for Record {
    fn from_row(desc: &EntityDescriptor, row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut fields = BTreeMap::new();
        for field in &desc.fields {
            fields.insert(field.name.clone(), row.get::<_, Value>(field.name.as_str())?);
        }
        Ok(Self {
            id: row.get(desc.identity.as_str())?,
            version: row.get(desc.version.as_str())?,
            token: row.get(desc.token.as_str())?,
            fields,
        })
    }

    fn domain_values(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
