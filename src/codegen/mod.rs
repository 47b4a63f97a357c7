//! Code generation: the universal patterns, the compiled-in target table, and
//! the renderer that turns entity descriptors into per-ecosystem source files.

pub mod pattern;
pub mod render;
pub mod target;
pub mod targets;

pub use pattern::{Pattern, PatternSet};
pub use render::{
    FileAction, RenderedFile, WriteOptions, WriteReport, render, render_target, write_rendered,
};
pub use target::{GenerationTarget, RenderFn, find_target, target_names, targets};
