use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScdError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },
    #[error("{entity} '{id}' version {version} conflicts with an existing row: {detail}")]
    ConflictOnInsert {
        entity: String,
        id: String,
        version: i64,
        detail: String,
    },
    #[error("Unsupported target '{target}' (known targets: {known})")]
    UnsupportedTarget { target: String, known: String },
    #[error("Target '{target}' has no mapping for pattern '{pattern}'")]
    MissingMapping { target: String, pattern: String },
    #[error("Capability violation in {entity}: {reason}")]
    CapabilityViolation { entity: String, reason: String },
    #[error("Mutation rejected for {entity} '{id}': {reason}")]
    MutationRejected {
        entity: String,
        id: String,
        reason: String,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ScdError {
    pub(crate) fn capability(entity: &str, reason: impl Into<String>) -> Self {
        ScdError::CapabilityViolation {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(entity: &str, id: &str) -> Self {
        ScdError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Stable machine-readable kind, used in audit events and CLI JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            ScdError::RusqliteError(_) => "storage",
            ScdError::IoError(_) => "io",
            ScdError::NotFound { .. } => "not_found",
            ScdError::ConflictOnInsert { .. } => "conflict_on_insert",
            ScdError::UnsupportedTarget { .. } => "unsupported_target",
            ScdError::MissingMapping { .. } => "missing_mapping",
            ScdError::CapabilityViolation { .. } => "capability_violation",
            ScdError::MutationRejected { .. } => "mutation_rejected",
            ScdError::ConfigError(_) => "config",
            ScdError::ValidationError(_) => "validation",
        }
    }
}
