//! CLI struct definitions for the scdkit command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "scdkit",
    version = env!("CARGO_PKG_VERSION"),
    about = "Append-only versioned entities over SQLite, and generated latest-version / new-version code for GORM, Django and plain SQL."
)]
pub(crate) struct Cli {
    /// Path to scd.toml. Relative store and output paths resolve against its directory.
    #[clap(long, global = true, default_value = "scd.toml")]
    pub config: PathBuf,
    /// Actor name recorded in the audit log.
    #[clap(long, global = true, default_value = "cli")]
    pub actor: String,
    /// Emit diagnostic logs on stderr.
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Write a starter scd.toml (if missing) and create every entity table.
    Init {
        /// Overwrite an existing scd.toml.
        #[clap(long)]
        force: bool,
    },
    /// Render the universal patterns for every configured entity.
    Generate(GenerateCli),
    /// Read and write versioned entity rows.
    Entity(EntityCli),
    /// Delete every row of one entity. The only path that removes rows.
    Reset {
        /// Entity name or table.
        entity: String,
        /// Required confirmation.
        #[clap(long)]
        yes: bool,
    },
    /// List the compiled-in generation targets.
    Targets {
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the DDL scdkit uses for each entity table.
    Schema {
        /// Limit to one entity (name or table).
        #[clap(long)]
        entity: Option<String>,
    },
    /// Show the storage audit log.
    Events {
        /// Only the last N events.
        #[clap(long)]
        tail: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum PatternArg {
    LatestVersionQuery,
    NewVersionOperation,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GenerateCli {
    /// Target name (see `scdkit targets`). Defaults to `[generate] target`.
    #[clap(long)]
    pub target: Option<String>,
    /// Output directory. Defaults to `[generate] out_dir`.
    #[clap(long)]
    pub out: Option<PathBuf>,
    /// Render only these patterns (repeatable). Defaults to the universal set.
    #[clap(long = "pattern", value_enum)]
    pub patterns: Vec<PatternArg>,
    /// Show what would be written without writing.
    #[clap(long)]
    pub dry_run: bool,
    /// Overwrite generated files whose contents changed.
    #[clap(long)]
    pub force: bool,
    /// Fail if the files on disk differ from a fresh render. Writes nothing.
    #[clap(long, conflicts_with_all = ["dry_run", "force"])]
    pub check: bool,
}

#[derive(clap::Args, Debug)]
pub(crate) struct EntityCli {
    #[clap(subcommand)]
    pub command: EntityCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum EntityCommand {
    /// Store version 1 of a new id.
    Create {
        entity: String,
        id: String,
        /// column=value, typed by the field kind. `null` clears.
        #[clap(long = "set")]
        set: Vec<String>,
    },
    /// Copy the latest version of an id into version + 1, applying assignments.
    NewVersion {
        entity: String,
        id: String,
        #[clap(long = "set")]
        set: Vec<String>,
    },
    /// Ask for an in-place update of the row with this token; stored as a new version.
    Update {
        entity: String,
        token: String,
        #[clap(long = "set")]
        set: Vec<String>,
    },
    /// Latest version of one id, or of every id matching the filters.
    Latest {
        entity: String,
        id: Option<String>,
        /// column=value equality filter (repeatable).
        #[clap(long = "where")]
        filters: Vec<String>,
        #[clap(long)]
        limit: Option<u32>,
    },
    /// Every version of an id, oldest first.
    History { entity: String, id: String },
    /// One row by version token.
    Get { entity: String, token: String },
}
