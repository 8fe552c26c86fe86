//! The build output handed to downstream consumers.

use crate::element::ArtifactElement;
use kiln_common::CanonicalId;
use kiln_diagnostics::Diagnostic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cache classification counts, one per discovered file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Files whose stored elements were reused.
    pub hits: usize,
    /// Files that were (re-)evaluated.
    pub misses: usize,
    /// Files excluded by include/exclude configuration.
    pub skips: usize,
}

/// Timing, warnings and cache statistics for one build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    /// Wall-clock build time in milliseconds.
    pub duration_ms: u64,
    /// Non-fatal problems, e.g. element failures in partial builds.
    pub warnings: Vec<Diagnostic>,
    /// Hit/miss/skip counts.
    pub stats: CacheStats,
}

/// Every resolved element keyed by canonical ID, plus the build report.
///
/// Consumers look elements up by ID; the map is ordered only so the JSON
/// output is stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BuilderArtifact {
    /// Resolved elements.
    pub elements: BTreeMap<CanonicalId, ArtifactElement>,
    /// The build report.
    pub report: BuildReport,
}

impl BuilderArtifact {
    /// Looks up an element by its `file::path` string.
    pub fn element(&self, id: &str) -> Option<&ArtifactElement> {
        self.elements
            .iter()
            .find(|(key, _)| key.as_str() == id)
            .map(|(_, element)| element)
    }

    /// Finds the operation with the given name.
    pub fn operation(&self, name: &str) -> Option<(&CanonicalId, &ArtifactElement)> {
        self.elements
            .iter()
            .find(|(_, element)| element.operation_name() == Some(name))
    }

    /// Serializes the artifact as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
