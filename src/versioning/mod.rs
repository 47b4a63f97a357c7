//! Append-only versioning over the capability contract.
//!
//! - [`entity`]: the `Versioned` / `Entity` traits every versionable type implements
//! - [`record`]: a descriptor-driven `Record` for entities defined only in config
//! - [`view`]: the composable latest-version query
//! - [`runtime`]: lookups, initial creation and new-version creation
//! - [`guard`]: the update-redirecting write path

pub mod entity;
pub mod guard;
pub mod record;
pub mod runtime;
pub mod view;

pub use entity::{Entity, Versioned};
pub use guard::{UpdateGuard, WriteOutcome};
pub use record::Record;
pub use runtime::{VersionedTable, create_new_version, latest_version_view};
pub use view::{Cmp, LatestView};
