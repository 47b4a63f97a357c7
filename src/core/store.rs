//! Store abstraction: where the versioned tables and the audit log live.

use std::path::{Path, PathBuf};

pub const DEFAULT_DB_NAME: &str = "scd.db";
pub const AUDIT_LOG_NAME: &str = "scd.events.jsonl";

/// Store handle representing one SCD workspace.
///
/// The database file and the broker audit log sit side by side under `root`.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
    /// Database file name relative to `root`
    pub db_name: String,
}

impl Store {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            db_name: DEFAULT_DB_NAME.to_string(),
        }
    }

    pub fn with_db_name(root: &Path, db_name: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            db_name: db_name.to_string(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(&self.db_name)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join(AUDIT_LOG_NAME)
    }
}
