//! scdkit: slowly changing dimension toolkit.
//!
//! Entities are stored append-only. Every change to an entity is a new row
//! with the same id, the next version number and a fresh version token; rows
//! are never updated in place. Reads go through the latest-version view, which
//! yields at most one row per id.
//!
//! # Architecture
//!
//! - [`core`]: errors, configuration, descriptors, SQLite connection setup and
//!   the audited `DbBroker` that CLI operations go through.
//! - [`versioning`]: the runtime: `find_latest`, `create_new_version`, the
//!   composable `LatestView`, and `UpdateGuard`, which turns update requests
//!   into new versions.
//! - [`models`]: the built-in Job / Timelog / PaymentLineItem entities and the
//!   repositories that query them.
//! - [`codegen`]: the two universal patterns and the compiled-in targets
//!   (`gorm`, `django`, `sqlite`) that render them as source code.
//!
//! # Examples
//!
//! ```bash
//! # Create tables for the configured (or built-in) entities
//! scdkit init
//!
//! # Version an entity
//! scdkit entity create Job job1 --set status=active --set rate=100 \
//!     --set title=Engineer --set company_id=comp1 --set contractor_id=cont1
//! scdkit entity new-version Job job1 --set status=completed --set rate=150
//! scdkit entity latest Job job1
//!
//! # Generate code
//! scdkit generate --target gorm --out ./internal
//! scdkit generate --target gorm --out ./internal --check
//! ```

pub mod codegen;
pub mod core;
pub mod models;
pub mod versioning;

mod cli;

use crate::cli::{Cli, Command, EntityCommand, GenerateCli, OutputFormat, PatternArg};
use crate::codegen::{Pattern, PatternSet, WriteOptions};
use crate::core::broker::{self, DbBroker};
use crate::core::config::{self, LoadedConfig};
use crate::core::descriptor::{self, EntityDescriptor};
use crate::core::{db, error};
use crate::versioning::{Record, UpdateGuard, VersionedTable, WriteOutcome};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::fs;

pub fn run() -> Result<(), error::ScdError> {
    let cli = Cli::parse();

    if cli.verbose {
        // A second init (tests, embedding) keeps the first subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .try_init();
    }

    let loaded = config::load_config(&cli.config)?;
    tracing::debug!(
        config = %cli.config.display(),
        entities = loaded.entities().len(),
        "configuration loaded"
    );

    match cli.command {
        Command::Init { force } => run_init(&cli.config, &loaded, &cli.actor, force),
        Command::Generate(generate) => run_generate(&loaded, generate),
        Command::Entity(entity) => run_entity(&loaded, &cli.actor, entity.command),
        Command::Reset { entity, yes } => run_reset(&loaded, &cli.actor, &entity, yes),
        Command::Targets { format } => run_targets(format),
        Command::Schema { entity } => run_schema(&loaded, entity.as_deref()),
        Command::Events { tail } => run_events(&loaded, tail),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), error::ScdError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| {
        error::ScdError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    println!("{}", out);
    Ok(())
}

fn run_init(
    config_path: &std::path::Path,
    loaded: &LoadedConfig,
    actor: &str,
    force: bool,
) -> Result<(), error::ScdError> {
    if !config_path.exists() || force {
        let starter = toml::to_string_pretty(&loaded.config)
            .map_err(|e| error::ScdError::ConfigError(e.to_string()))?;
        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, starter)?;
        println!("  {} {}", "wrote:".bright_green(), config_path.display());
    } else {
        println!(
            "  {} {} (exists; pass --force to overwrite)",
            "kept:".bright_black(),
            config_path.display()
        );
    }

    let store = loaded.store();
    fs::create_dir_all(&store.root)?;
    let broker = DbBroker::new(&store);
    broker.with_conn(actor, "init", "*", |conn| {
        db::initialize_entity_tables(conn, loaded.entities())
    })?;

    for desc in loaded.entities() {
        println!(
            "  {} {} ({})",
            "table:".bright_cyan(),
            desc.table.bold(),
            desc.name
        );
    }
    println!(
        "{} store ready at {}",
        "✓".bright_green(),
        store.db_path().display()
    );
    Ok(())
}

fn pattern_set(args: &[PatternArg]) -> PatternSet {
    if args.is_empty() {
        return PatternSet::universal();
    }
    let patterns: Vec<Pattern> = args
        .iter()
        .map(|a| match a {
            PatternArg::LatestVersionQuery => Pattern::LatestVersionQuery,
            PatternArg::NewVersionOperation => Pattern::NewVersionOperation,
        })
        .collect();
    PatternSet::of(&patterns)
}

fn run_generate(loaded: &LoadedConfig, args: GenerateCli) -> Result<(), error::ScdError> {
    let target_name = args
        .target
        .or_else(|| loaded.config.generate.target.clone())
        .ok_or_else(|| {
            error::ScdError::ValidationError(format!(
                "No target given; pass --target (one of: {})",
                codegen::target_names().join(", ")
            ))
        })?;
    let target = codegen::find_target(&target_name)?;
    let patterns = pattern_set(&args.patterns);

    // Render everything before touching the filesystem.
    let files = codegen::render(&patterns, target, loaded.entities())?;

    let out_dir = match args.out {
        Some(dir) => dir,
        None => loaded.out_dir(),
    };
    let opts = WriteOptions {
        out_dir,
        force: args.force,
        dry_run: args.dry_run,
        check: args.check,
    };
    let report = codegen::write_rendered(&files, &opts)?;

    println!(
        "Generating {} for {} entities ({})",
        target.name.bold(),
        loaded.entities().len(),
        target.ecosystem
    );
    for entry in &report.entries {
        let label = entry.action.label();
        let label = match entry.action {
            codegen::FileAction::Wrote => label.bright_green(),
            codegen::FileAction::Unchanged | codegen::FileAction::Checked => label.bright_black(),
            _ => label.bright_yellow(),
        };
        println!(
            "  {}: {} {}",
            label,
            entry.path.display(),
            entry.digest[..12].bright_black()
        );
    }
    Ok(())
}

fn run_entity(
    loaded: &LoadedConfig,
    actor: &str,
    command: EntityCommand,
) -> Result<(), error::ScdError> {
    let broker = DbBroker::new(&loaded.store());
    let entities = loaded.entities();

    match command {
        EntityCommand::Create { entity, id, set } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            let mut draft = Record::draft(&id);
            draft.apply_assignments(desc, &set)?;
            let created = broker.with_conn(actor, "entity.create", &desc.name, |conn| {
                let table = VersionedTable::bind(conn, desc)?;
                UpdateGuard::new(conn, table).insert(draft)
            })?;
            print_outcome(desc, &created)
        }
        EntityCommand::NewVersion { entity, id, set } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            // Parse assignments before opening the store; the mutation only copies them.
            let mut changes = Record::draft(&id);
            changes.apply_assignments(desc, &set)?;
            let record: Record =
                broker.with_conn(actor, "entity.new_version", &desc.name, |conn| {
                    VersionedTable::bind(conn, desc)?.create_new_version(
                        conn,
                        &id,
                        |next: &mut Record| next.fields.extend(changes.fields),
                    )
                })?;
            print_json(&record.to_json(desc))
        }
        EntityCommand::Update { entity, token, set } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            let outcome = broker.with_conn(actor, "entity.update", &desc.name, |conn| {
                let table = VersionedTable::bind(conn, desc)?;
                let mut modified: Record = table.find_by_token(conn, &token)?.ok_or_else(|| {
                    error::ScdError::not_found(&desc.name, &format!("{}={}", desc.token, token))
                })?;
                modified.apply_assignments(desc, &set)?;
                UpdateGuard::new(conn, table).update(&modified)
            })?;
            print_outcome(desc, &outcome)
        }
        EntityCommand::Latest {
            entity,
            id,
            filters,
            limit,
        } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            let mut wanted = Record::draft("");
            wanted.apply_assignments(desc, &filters)?;
            let rows: Vec<Record> = broker.with_conn(actor, "entity.latest", &desc.name, |conn| {
                let table = VersionedTable::bind(conn, desc)?;
                let mut view = table.latest_view();
                if let Some(id) = &id {
                    view = view.filter_eq(&desc.identity, id.clone());
                }
                for (column, value) in &wanted.fields {
                    view = view.filter_eq(column, value.clone());
                }
                if let Some(n) = limit {
                    view = view.limit(n);
                }
                view.fetch(conn)
            })?;
            match (&id, rows.as_slice()) {
                (Some(id), []) => Err(error::ScdError::not_found(&desc.name, id)),
                (Some(_), [row]) => print_json(&row.to_json(desc)),
                _ => print_json(&rows.iter().map(|r| r.to_json(desc)).collect::<Vec<_>>()),
            }
        }
        EntityCommand::History { entity, id } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            let rows: Vec<Record> = broker.with_conn(actor, "entity.history", &desc.name, |conn| {
                VersionedTable::bind(conn, desc)?.history(conn, &id)
            })?;
            if rows.is_empty() {
                return Err(error::ScdError::not_found(&desc.name, &id));
            }
            print_json(&rows.iter().map(|r| r.to_json(desc)).collect::<Vec<_>>())
        }
        EntityCommand::Get { entity, token } => {
            let desc = descriptor::find_descriptor(entities, &entity)?;
            let row: Option<Record> = broker.with_conn(actor, "entity.get", &desc.name, |conn| {
                VersionedTable::bind(conn, desc)?.find_by_token(conn, &token)
            })?;
            match row {
                Some(r) => print_json(&r.to_json(desc)),
                None => Err(error::ScdError::not_found(
                    &desc.name,
                    &format!("{}={}", desc.token, token),
                )),
            }
        }
    }
}

fn print_outcome(
    desc: &EntityDescriptor,
    outcome: &WriteOutcome<Record>,
) -> Result<(), error::ScdError> {
    let body = match outcome {
        WriteOutcome::Inserted(record) => json!({
            "outcome": "inserted",
            "record": record.to_json(desc),
        }),
        WriteOutcome::Redirected {
            superseded_token,
            record,
        } => json!({
            "outcome": "redirected",
            "superseded": superseded_token,
            "record": record.to_json(desc),
        }),
    };
    print_json(&body)
}

fn run_reset(
    loaded: &LoadedConfig,
    actor: &str,
    entity: &str,
    yes: bool,
) -> Result<(), error::ScdError> {
    let desc = descriptor::find_descriptor(loaded.entities(), entity)?;
    if !yes {
        return Err(error::ScdError::ValidationError(format!(
            "Reset deletes every version of every {} row; pass --yes to confirm",
            desc.name
        )));
    }
    let broker = DbBroker::new(&loaded.store());
    let removed = broker.with_conn(actor, "reset", &desc.name, |conn| {
        let table = VersionedTable::bind(conn, desc)?;
        UpdateGuard::new(conn, table).reset()
    })?;
    println!(
        "{} removed {} rows from {}",
        "✓".bright_green(),
        removed,
        desc.table
    );
    Ok(())
}

fn run_targets(format: OutputFormat) -> Result<(), error::ScdError> {
    match format {
        OutputFormat::Json => {
            let items: Vec<_> = codegen::targets()
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "ecosystem": t.ecosystem,
                        "description": t.description,
                        "patterns": t.mappings.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_json(&items)
        }
        OutputFormat::Text => {
            for t in codegen::targets() {
                println!("{:<8} {}", t.name.bold(), t.ecosystem.bright_cyan());
                println!("         {}", t.description);
            }
            Ok(())
        }
    }
}

fn run_schema(loaded: &LoadedConfig, entity: Option<&str>) -> Result<(), error::ScdError> {
    let all = loaded.entities();
    let selected: Vec<&EntityDescriptor> = match entity {
        Some(name) => vec![descriptor::find_descriptor(all, name)?],
        None => all.iter().collect(),
    };
    for desc in selected {
        println!("-- {}", desc.name);
        for stmt in db::entity_schema(desc, all) {
            println!("{};\n", stmt);
        }
    }
    Ok(())
}

fn run_events(loaded: &LoadedConfig, tail: Option<usize>) -> Result<(), error::ScdError> {
    let events = broker::read_events(&loaded.store())?;
    let skip = match tail {
        Some(n) => events.len().saturating_sub(n),
        None => 0,
    };
    print_json(&events[skip..].to_vec())
}
