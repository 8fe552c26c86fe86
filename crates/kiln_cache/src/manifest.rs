//! The per-configuration fingerprint manifest.
//!
//! Each build configuration owns one JSON manifest at
//! `<cache_dir>/<config>.json`. It lists, per source file, the content hash
//! seen by the last successful build, the canonical IDs the file declared and
//! the fingerprint of the artifact payload produced for it.

use std::path::{Path, PathBuf};

use kiln_common::{CanonicalId, ContentHash};
use serde::{Deserialize, Serialize};

use crate::blob::write_atomic;
use crate::error::CacheError;

/// Bumped whenever the manifest or payload layout changes incompatibly.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Cached state for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The file key (the file component of its canonical IDs).
    pub file_path: String,
    /// Content hash of the file when it was last built.
    pub content_hash: ContentHash,
    /// Canonical IDs the file declared.
    pub canonical_ids: Vec<CanonicalId>,
    /// Key of the artifact payload blob for this file.
    pub last_artifact_fingerprint: ContentHash,
}

/// The on-disk manifest of one build configuration.
///
/// Unknown fields are ignored on load so newer tools can add fields
/// without invalidating older caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheManifest {
    /// Layout version; a mismatch discards the manifest.
    pub format_version: u32,
    /// Fingerprint of the resolved build configuration.
    pub config_fingerprint: ContentHash,
    /// One entry per cached file, sorted by file path.
    pub entries: Vec<CacheEntry>,
}

impl CacheManifest {
    /// Creates an empty manifest for the given configuration fingerprint.
    pub fn new(config_fingerprint: ContentHash) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            config_fingerprint,
            entries: Vec::new(),
        }
    }

    /// Returns the manifest path of a build configuration.
    pub fn path(cache_dir: &Path, config_name: &str) -> PathBuf {
        cache_dir.join(format!("{config_name}.json"))
    }

    /// Loads a manifest, returning `None` if it is missing or unparsable.
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Returns `true` if the manifest was written with the current layout
    /// for the same configuration.
    pub fn is_compatible(&self, config_fingerprint: &ContentHash) -> bool {
        self.format_version == MANIFEST_FORMAT_VERSION && self.config_fingerprint == *config_fingerprint
    }

    /// Writes the manifest with a single atomic rename, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(CacheError::io(dir))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(CacheError::serialization)?;
        write_atomic(path, json.as_bytes())
    }
}
