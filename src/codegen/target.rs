use crate::codegen::pattern::{Pattern, PatternSet};
use crate::codegen::targets::{django, gorm, sqlite};
use crate::core::descriptor::EntityDescriptor;
use crate::core::error::ScdError;
use std::fmt;

/// Renders one universal pattern for one entity.
pub type RenderFn = fn(&EntityDescriptor) -> String;

/// One storage-access ecosystem: where its files go, what each file starts
/// with, and a lookup table from pattern to renderer.
#[derive(Clone, Copy)]
pub struct GenerationTarget {
    pub name: &'static str,
    pub ecosystem: &'static str,
    pub description: &'static str,
    /// Output path for an entity, relative to the output directory.
    pub location: fn(&EntityDescriptor) -> String,
    /// File preamble; receives the patterns being rendered so imports match.
    pub header: fn(&EntityDescriptor, &PatternSet) -> String,
    pub mappings: &'static [(Pattern, RenderFn)],
}

impl GenerationTarget {
    pub fn renderer(&self, pattern: Pattern) -> Option<RenderFn> {
        self.mappings
            .iter()
            .find(|(p, _)| *p == pattern)
            .map(|(_, f)| *f)
    }

    /// Fails with `MissingMapping` on the first pattern this target cannot render.
    pub fn ensure_covers(&self, patterns: &PatternSet) -> Result<(), ScdError> {
        match patterns.iter().find(|p| self.renderer(*p).is_none()) {
            Some(missing) => Err(ScdError::MissingMapping {
                target: self.name.to_string(),
                pattern: missing.name().to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for GenerationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationTarget")
            .field("name", &self.name)
            .field("ecosystem", &self.ecosystem)
            .field(
                "patterns",
                &self.mappings.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// --- Compiled-in targets ---

static TARGETS: [&GenerationTarget; 3] = [&gorm::TARGET, &django::TARGET, &sqlite::TARGET];

pub fn targets() -> &'static [&'static GenerationTarget] {
    &TARGETS
}

pub fn target_names() -> Vec<&'static str> {
    targets().iter().map(|t| t.name).collect()
}

pub fn find_target(name: &str) -> Result<&'static GenerationTarget, ScdError> {
    targets()
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ScdError::UnsupportedTarget {
            target: name.to_string(),
            known: target_names().join(", "),
        })
}
