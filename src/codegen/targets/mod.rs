//! Per-ecosystem renderers. Each submodule exposes a `TARGET` table entry and
//! one public render function per universal pattern.

pub mod django;
pub mod gorm;
pub mod sqlite;

/// First line of every generated file, minus the comment leader.
pub(crate) const GENERATED_MARKER: &str = "Code generated by scdkit. DO NOT EDIT.";

const GO_INITIALISMS: &[&str] = &["id", "uid", "url", "api", "json", "http", "sql"];

/// `company_id` -> `CompanyID`, `uid` -> `UID`, following Go initialism style.
pub(crate) fn go_field_name(column: &str) -> String {
    column
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if GO_INITIALISMS.contains(&part) {
                part.to_ascii_uppercase()
            } else {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect()
}
