//! The universal patterns: storage-agnostic descriptions of the two
//! operations every target must render.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Inputs: identity and version field names. Output: a query fragment that
    /// yields, per id, the row at that id's maximum version, and stays composable
    /// with further predicates.
    LatestVersionQuery,
    /// Inputs: identity, version and token field names plus a caller mutation.
    /// Output: lookup latest or fail not-found, copy, mint a fresh token, version
    /// + 1, apply mutation, insert or fail on conflict.
    NewVersionOperation,
}

impl Pattern {
    pub const ALL: [Pattern; 2] = [Pattern::LatestVersionQuery, Pattern::NewVersionOperation];

    pub fn name(self) -> &'static str {
        match self {
            Pattern::LatestVersionQuery => "LatestVersionQuery",
            Pattern::NewVersionOperation => "NewVersionOperation",
        }
    }

    pub fn summary(self) -> &'static str {
        match self {
            Pattern::LatestVersionQuery => "Rows at the maximum version of each id",
            Pattern::NewVersionOperation => {
                "Copy the latest row into version + 1 under a fresh token"
            }
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The ordered set of patterns a generation run must cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Both universal patterns, in canonical order.
    pub fn universal() -> Self {
        Self {
            patterns: Pattern::ALL.to_vec(),
        }
    }

    /// A subset, deduplicated and put in canonical order.
    pub fn of(patterns: &[Pattern]) -> Self {
        let mut patterns = patterns.to_vec();
        patterns.sort();
        patterns.dedup();
        Self { patterns }
    }

    pub fn iter(&self) -> impl Iterator<Item = Pattern> + '_ {
        self.patterns.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::universal()
    }
}
