//! Plain SQLite SQL: a `{table}_latest` view and a parameterised
//! `INSERT ... SELECT` that copies the latest row forward.

use super::GENERATED_MARKER;
use crate::codegen::pattern::{Pattern, PatternSet};
use crate::codegen::target::GenerationTarget;
use crate::core::descriptor::EntityDescriptor;

pub static TARGET: GenerationTarget = GenerationTarget {
    name: "sqlite",
    ecosystem: "SQLite SQL",
    description: "A latest-version view and a named-parameter INSERT for version + 1",
    location,
    header,
    mappings: &[
        (Pattern::LatestVersionQuery, render_latest_version_query),
        (Pattern::NewVersionOperation, render_new_version_operation),
    ],
};

pub fn location(desc: &EntityDescriptor) -> String {
    format!("sql/{}_scd.sql", desc.table)
}

pub fn header(desc: &EntityDescriptor, patterns: &PatternSet) -> String {
    let names: Vec<&str> = patterns.iter().map(Pattern::name).collect();
    format!(
        "-- {}\n-- Source entity: {} (table {}). Patterns: {}.\n",
        GENERATED_MARKER,
        desc.name,
        desc.table,
        names.join(", ")
    )
}

pub fn render_latest_version_query(desc: &EntityDescriptor) -> String {
    let cols = desc
        .columns()
        .iter()
        .map(|c| format!("{}.{}", desc.table, c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "-- {name}: one row per {id}, at its highest {version}. Filter the view freely.\n\
         CREATE VIEW IF NOT EXISTS {table}_latest AS\n\
         SELECT {cols}\n\
         FROM {table}\n\
         JOIN (SELECT {id}, MAX({version}) AS max_version FROM {table} GROUP BY {id}) AS latest\n\
         \x20 ON {table}.{id} = latest.{id} AND {table}.{version} = latest.max_version;\n",
        name = desc.name,
        table = desc.table,
        id = desc.identity,
        version = desc.version,
        cols = cols,
    )
}

/// Binds `:{id}` and `:{token}` (the fresh token); every domain field binds
/// `:{field}`, where NULL keeps the prior value. Zero rows changed means the
/// id has no versions; a constraint error means another writer won the race.
pub fn render_new_version_operation(desc: &EntityDescriptor) -> String {
    let columns = desc.columns().join(", ");
    let mut select = vec![
        desc.identity.clone(),
        format!("{} + 1", desc.version),
        format!(":{}", desc.token),
    ];
    select.extend(
        desc.fields
            .iter()
            .map(|f| format!("COALESCE(:{0}, {0})", f.name)),
    );
    format!(
        "-- {name}: copy the latest row of :{id} into {version} + 1 under :{token}.\n\
         INSERT INTO {table} ({columns})\n\
         SELECT {select}\n\
         FROM {table}\n\
         WHERE {id} = :{id}\n\
         ORDER BY {version} DESC\n\
         LIMIT 1;\n",
        name = desc.name,
        table = desc.table,
        id = desc.identity,
        version = desc.version,
        token = desc.token,
        columns = columns,
        select = select.join(", "),
    )
}
