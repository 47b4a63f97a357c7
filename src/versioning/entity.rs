//! The capability contract a type must satisfy to be versioned.
//!
//! [`Versioned`] exposes typed access to the three versioning fields. The
//! runtime never looks fields up by name on the Rust side; column names come
//! from the [`EntityDescriptor`] only when rows cross the storage boundary.

use crate::core::descriptor::EntityDescriptor;
use rusqlite::Row;
use rusqlite::types::Value;

pub trait Versioned {
    fn id(&self) -> &str;
    fn version(&self) -> i64;
    fn set_version(&mut self, version: i64);
    fn token(&self) -> &str;
    fn set_token(&mut self, token: String);
}

/// Storage binding for a versioned type.
pub trait Entity: Versioned + Clone {
    /// Decodes one row. Columns are addressed by the names in `desc`.
    fn from_row(desc: &EntityDescriptor, row: &Row<'_>) -> rusqlite::Result<Self>;

    /// `(column, value)` for every domain field. Identity, version and token are
    /// written from the [`Versioned`] accessors and must not appear here.
    fn domain_values(&self) -> Vec<(String, Value)>;
}

/// Implements [`Versioned`] for a struct with plain `String` / `i64` fields.
///
/// ```ignore
/// versioned_entity!(Job { id: id, version: version, token: uid });
/// ```
#[macro_export]
macro_rules! versioned_entity {
    ($ty:ty { id: $id:ident, version: $version:ident, token: $token:ident }) => {
        impl $crate::versioning::entity::Versioned for $ty {
            fn id(&self) -> &str {
                &self.$id
            }
            fn version(&self) -> i64 {
                self.$version
            }
            fn set_version(&mut self, version: i64) {
                self.$version = version;
            }
            fn token(&self) -> &str {
                &self.$token
            }
            fn set_token(&mut self, token: String) {
                self.$token = token;
            }
        }
    };
}
