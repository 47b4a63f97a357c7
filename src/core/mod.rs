//! Shared primitives: errors, storage connection, broker audit log, store
//! layout, configuration, and the entity metadata both halves of the crate
//! are driven by.

pub mod broker;
pub mod config;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod store;
pub mod time;
