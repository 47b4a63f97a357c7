//! Go / GORM. One file per entity, generated into the package that declares
//! the entity struct so the code can name the struct and its fields directly.

use super::{GENERATED_MARKER, go_field_name};
use crate::codegen::pattern::{Pattern, PatternSet};
use crate::codegen::target::GenerationTarget;
use crate::core::descriptor::EntityDescriptor;

pub static TARGET: GenerationTarget = GenerationTarget {
    name: "gorm",
    ecosystem: "Go / GORM",
    description: "Scopes and helpers over gorm.DB, written next to the model structs",
    location,
    header,
    mappings: &[
        (Pattern::LatestVersionQuery, render_latest_version_query),
        (Pattern::NewVersionOperation, render_new_version_operation),
    ],
};

pub fn location(desc: &EntityDescriptor) -> String {
    format!("models/{}_scd.go", desc.snake_name())
}

pub fn header(desc: &EntityDescriptor, patterns: &PatternSet) -> String {
    let needs_create = patterns.iter().any(|p| p == Pattern::NewVersionOperation);
    let mut imports: Vec<&str> = Vec::new();
    if needs_create {
        imports.extend(["\"errors\"", "\"fmt\"", "", "\"github.com/oklog/ulid/v2\""]);
    }
    imports.push("\"gorm.io/gorm\"");

    let mut out = format!(
        "// {}\n// Source entity: {} (table {}).\n\npackage models\n\nimport (\n",
        GENERATED_MARKER, desc.name, desc.table
    );
    for import in imports {
        if import.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("\t{}\n", import));
        }
    }
    out.push_str(")\n");
    out
}

pub fn render_latest_version_query(desc: &EntityDescriptor) -> String {
    format!(
        r#"// Latest{name}Versions scopes a query on {table} to the row at the highest
// version of each {id}. Chain Where/Joins on the result; every {id} still yields
// at most one row.
func Latest{name}Versions(db *gorm.DB) *gorm.DB {{
	latest := db.Session(&gorm.Session{{NewDB: true}}).
		Table("{table}").
		Select("{id}, MAX({version}) AS max_version").
		Group("{id}")
	return db.Model(&{name}{{}}).
		Joins("JOIN (?) AS latest ON {table}.{id} = latest.{id} AND {table}.{version} = latest.max_version", latest)
}}
"#,
        name = desc.name,
        table = desc.table,
        id = desc.identity,
        version = desc.version,
    )
}

pub fn render_new_version_operation(desc: &EntityDescriptor) -> String {
    format!(
        r#"// CreateNew{name}Version copies the latest {name} with the given {id} into
// version+1 under a freshly minted {token}, applies mutate, and inserts it.
// A missing {id} wraps gorm.ErrRecordNotFound. A lost race on ({id}, {version})
// or {token} wraps gorm.ErrDuplicatedKey when TranslateError is enabled.
func CreateNew{name}Version(db *gorm.DB, {id_arg} string, mutate func(*{name})) (*{name}, error) {{
	var prior {name}
	if err := db.Where("{id} = ?", {id_arg}).Order("{version} DESC").First(&prior).Error; err != nil {{
		return nil, fmt.Errorf("{snake} %q: latest version lookup: %w", {id_arg}, err)
	}}

	next := prior
	next.{token_field} = ulid.Make().String()
	next.{version_field} = prior.{version_field} + 1
	minted := next.{token_field}

	mutate(&next)
	if next.{id_field} != prior.{id_field} || next.{version_field} != prior.{version_field}+1 || next.{token_field} != minted {{
		return nil, fmt.Errorf("{snake} %q: mutate must not change {id}, {version} or {token}", {id_arg})
	}}

	if err := db.Create(&next).Error; err != nil {{
		if errors.Is(err, gorm.ErrDuplicatedKey) {{
			return nil, fmt.Errorf("{snake} %q version %d conflicts with an existing row: %w", {id_arg}, next.{version_field}, err)
		}}
		return nil, fmt.Errorf("{snake} %q version %d: insert: %w", {id_arg}, next.{version_field}, err)
	}}
	return &next, nil
}}
"#,
        name = desc.name,
        snake = desc.snake_name(),
        id = desc.identity,
        version = desc.version,
        token = desc.token,
        id_arg = go_arg_name(&desc.identity),
        id_field = go_field_name(&desc.identity),
        version_field = go_field_name(&desc.version),
        token_field = go_field_name(&desc.token),
    )
}

/// Go parameter name for the identity column; avoids shadowing a Go keyword.
fn go_arg_name(column: &str) -> String {
    const KEYWORDS: &[&str] = &["type", "func", "var", "range", "map", "go", "select"];
    if KEYWORDS.contains(&column) {
        format!("{}Value", column)
    } else {
        let field = go_field_name(column);
        let mut chars = field.chars();
        match chars.next() {
            // ID -> id, UID -> uid, CompanyID -> companyID
            Some(_) if field.chars().all(|c| c.is_ascii_uppercase()) => field.to_ascii_lowercase(),
            Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
            None => "id".to_string(),
        }
    }
}
