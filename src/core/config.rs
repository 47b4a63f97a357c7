//! `scd.toml` loading.
//!
//! ```toml
//! [store]
//! db = "scd.db"
//!
//! [generate]
//! out_dir = "generated"
//!
//! [[entity]]
//! name = "Job"
//! table = "jobs"
//! fields = [
//!     { name = "status", kind = "text", required = true },
//!     { name = "rate", kind = "real" },
//! ]
//! ```
//!
//! A missing file, or a file that declares no `[[entity]]`, falls back to the
//! built-in Job / Timelog / PaymentLineItem descriptors.

use crate::core::descriptor::{self, EntityDescriptor};
use crate::core::error::ScdError;
use crate::core::store::{self, Store};
use crate::models;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "scd.toml";

fn default_db() -> String {
    store::DEFAULT_DB_NAME.to_string()
}

fn default_out_dir() -> String {
    "generated".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db")]
    pub db: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db: default_db() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
    /// Target used when `generate` is invoked without `--target`.
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScdConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDescriptor>,
}

/// Loaded configuration plus the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ScdConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn store(&self) -> Store {
        Store::with_db_name(&self.base_dir, &self.config.store.db)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.generate.out_dir)
    }

    pub fn entities(&self) -> &[EntityDescriptor] {
        &self.config.entities
    }
}

pub fn parse_config(content: &str) -> Result<ScdConfig, ScdError> {
    let mut config: ScdConfig =
        toml::from_str(content).map_err(|e| ScdError::ConfigError(e.to_string()))?;
    if config.entities.is_empty() {
        config.entities = models::builtin_descriptors();
    }
    descriptor::validate_all(&config.entities)?;
    Ok(config)
}

/// Load `scd.toml` from `path`. A missing file is not an error: the defaults apply,
/// with `path`'s parent directory as the base for relative paths.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ScdError> {
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = if path.exists() {
        let content = fs::read_to_string(path).map_err(ScdError::IoError)?;
        parse_config(&content)
            .map_err(|e| match e {
                ScdError::ConfigError(msg) => {
                    ScdError::ConfigError(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using built-in entities");
        ScdConfig {
            entities: models::builtin_descriptors(),
            ..ScdConfig::default()
        }
    };

    Ok(LoadedConfig { config, base_dir })
}
