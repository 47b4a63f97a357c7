//! Entity metadata shared by the versioning runtime and the generator.
//!
//! An [`EntityDescriptor`] names the table, the three versioning columns
//! (identity, version, token) and the ordered domain fields of one versioned
//! entity type. Descriptors are configuration: loaded once, validated once,
//! never persisted.

use crate::core::error::ScdError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier regex"))
}

/// True when `name` can be interpolated into SQL and generated source as a bare identifier.
pub fn is_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

/// Names the generated latest-version SQL uses for its own aliases.
const GENERATED_NAMES: &[&str] = &["latest", "max_version"];

/// SQLite keywords; none of them can stand unquoted as a table, column or alias.
const SQL_KEYWORDS: &[&str] = &[
    "abort", "action", "add", "after", "all", "alter", "always", "analyze", "and", "as", "asc",
    "attach", "autoincrement", "before", "begin", "between", "by", "cascade", "case", "cast",
    "check", "collate", "column", "commit", "conflict", "constraint", "create", "cross",
    "current", "current_date", "current_time", "current_timestamp", "database", "default",
    "deferrable", "deferred", "delete", "desc", "detach", "distinct", "do", "drop", "each",
    "else", "end", "escape", "except", "exclude", "exclusive", "exists", "explain", "fail",
    "filter", "first", "following", "for", "foreign", "from", "full", "generated", "glob",
    "group", "groups", "having", "if", "ignore", "immediate", "in", "index", "indexed",
    "initially", "inner", "insert", "instead", "intersect", "into", "is", "isnull", "join",
    "key", "last", "left", "like", "limit", "match", "materialized", "natural", "no", "not",
    "nothing", "notnull", "null", "nulls", "of", "offset", "on", "or", "order", "others",
    "outer", "over", "partition", "plan", "pragma", "preceding", "primary", "query", "raise",
    "range", "recursive", "references", "regexp", "reindex", "release", "rename", "replace",
    "restrict", "returning", "right", "rollback", "row", "rows", "savepoint", "select", "set",
    "table", "temp", "temporary", "then", "ties", "to", "transaction", "trigger", "unbounded",
    "union", "unique", "update", "using", "vacuum", "values", "view", "virtual", "when", "where",
    "window", "with", "without",
];

/// True when `name` collides with a SQL keyword or a generated alias, ignoring case.
pub fn is_reserved(name: &str) -> bool {
    GENERATED_NAMES
        .iter()
        .chain(SQL_KEYWORDS)
        .any(|r| r.eq_ignore_ascii_case(name))
}

fn default_identity() -> String {
    "id".to_string()
}

fn default_version() -> String {
    "version".to_string()
}

fn default_token() -> String {
    "uid".to_string()
}

/// Storage kind of a domain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Integer,
    Real,
    /// Unix epoch seconds.
    Timestamp,
    /// Version token of a row of another entity.
    Reference,
}

impl FieldKind {
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Reference => "TEXT",
            FieldKind::Integer | FieldKind::Timestamp => "INTEGER",
            FieldKind::Real => "REAL",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Real => "real",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Referenced entity name, required when `kind` is `reference`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// Stored `NOT NULL`; every version must carry a value.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    #[serde(default = "default_identity")]
    pub identity: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_token")]
    pub token: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Descriptor with the conventional `id` / `version` / `uid` columns and no domain fields.
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            identity: default_identity(),
            version: default_version(),
            token: default_token(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            references: None,
            required: false,
        });
        self
    }

    pub fn reference(mut self, name: &str, entity: &str) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Reference,
            references: Some(entity.to_string()),
            required: false,
        });
        self
    }

    /// Marks every field declared so far as required.
    pub fn require_all(mut self) -> Self {
        for field in &mut self.fields {
            field.required = true;
        }
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All physical columns: identity, version, token, then domain fields in declared order.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols = vec![
            self.identity.as_str(),
            self.version.as_str(),
            self.token.as_str(),
        ];
        cols.extend(self.fields.iter().map(|f| f.name.as_str()));
        cols
    }

    /// `PaymentLineItem` -> `payment_line_item`.
    pub fn snake_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 4);
        for (i, ch) in self.name.chars().enumerate() {
            if ch.is_ascii_uppercase() {
                if i > 0 {
                    out.push('_');
                }
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Checks the capability contract: identity, version and token are present,
    /// distinct, valid identifiers, and no domain field shadows them.
    pub fn validate(&self) -> Result<(), ScdError> {
        let entity = if self.name.is_empty() {
            "<unnamed entity>"
        } else {
            self.name.as_str()
        };
        if !is_identifier(&self.name) {
            return Err(ScdError::capability(entity, "entity name is not an identifier"));
        }
        if !is_identifier(&self.table) {
            return Err(ScdError::capability(
                entity,
                format!("table '{}' is not an identifier", self.table),
            ));
        }
        if is_reserved(&self.table) {
            return Err(ScdError::capability(
                entity,
                format!("table '{}' is a reserved name", self.table),
            ));
        }
        for (role, col) in [
            ("identity", &self.identity),
            ("version", &self.version),
            ("token", &self.token),
        ] {
            if col.is_empty() {
                return Err(ScdError::capability(entity, format!("no {} field", role)));
            }
            if !is_identifier(col) {
                return Err(ScdError::capability(
                    entity,
                    format!("{} field '{}' is not an identifier", role, col),
                ));
            }
            if is_reserved(col) {
                return Err(ScdError::capability(
                    entity,
                    format!("{} field '{}' is a reserved name", role, col),
                ));
            }
        }

        let mut seen = HashSet::new();
        for col in self.columns() {
            if !seen.insert(col) {
                return Err(ScdError::capability(
                    entity,
                    format!("column '{}' declared more than once", col),
                ));
            }
        }

        for field in &self.fields {
            if !is_identifier(&field.name) {
                return Err(ScdError::capability(
                    entity,
                    format!("field '{}' is not an identifier", field.name),
                ));
            }
            if is_reserved(&field.name) {
                return Err(ScdError::capability(
                    entity,
                    format!("field '{}' is a reserved name", field.name),
                ));
            }
            match (field.kind, &field.references) {
                (FieldKind::Reference, None) => {
                    return Err(ScdError::capability(
                        entity,
                        format!("reference field '{}' names no entity", field.name),
                    ));
                }
                (FieldKind::Reference, Some(_)) | (_, None) => {}
                (kind, Some(_)) => {
                    return Err(ScdError::capability(
                        entity,
                        format!(
                            "field '{}' of kind {} cannot reference another entity",
                            field.name,
                            kind.as_str()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Validates a descriptor set as a whole: each descriptor individually, unique
/// names and tables, and every reference resolving to a descriptor in the set.
pub fn validate_all(descriptors: &[EntityDescriptor]) -> Result<(), ScdError> {
    let mut names = HashSet::new();
    let mut tables = HashSet::new();
    for desc in descriptors {
        desc.validate()?;
        if !names.insert(desc.name.as_str()) {
            return Err(ScdError::capability(&desc.name, "entity declared more than once"));
        }
        if !tables.insert(desc.table.as_str()) {
            return Err(ScdError::capability(
                &desc.name,
                format!("table '{}' already used by another entity", desc.table),
            ));
        }
    }
    for desc in descriptors {
        for field in &desc.fields {
            if let Some(target) = &field.references
                && !names.contains(target.as_str())
            {
                return Err(ScdError::capability(
                    &desc.name,
                    format!(
                        "field '{}' references unknown entity '{}'",
                        field.name, target
                    ),
                ));
            }
        }
    }
    Ok(())
}

pub fn find_descriptor<'a>(
    descriptors: &'a [EntityDescriptor],
    name: &str,
) -> Result<&'a EntityDescriptor, ScdError> {
    descriptors
        .iter()
        .find(|d| d.name == name || d.table == name)
        .ok_or_else(|| {
            let known: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
            ScdError::ConfigError(format!(
                "Unknown entity '{}'. Configured entities: {}",
                name,
                known.join(", ")
            ))
        })
}
