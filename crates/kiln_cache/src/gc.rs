//! Garbage collection across every build configuration of a cache directory.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::blob::{BlobStore, ANALYSIS_SUBDIR, ARTIFACTS_SUBDIR};
use crate::error::CacheError;
use crate::manifest::CacheManifest;
use crate::store::analysis_key;

/// What a garbage collection pass found and removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Manifests that were read to compute the live set.
    pub manifests: usize,
    /// Artifact payload blobs removed.
    pub removed_artifacts: usize,
    /// Analysis blobs removed.
    pub removed_analyses: usize,
}

/// Removes every blob not referenced by a manifest in `cache_dir`.
///
/// A manifest that cannot be parsed contributes no live keys; its blobs
/// are collected like any other unreferenced blob.
pub fn collect_garbage(cache_dir: &Path) -> Result<GcStats, CacheError> {
    let mut stats = GcStats::default();
    if !cache_dir.exists() {
        return Ok(stats);
    }

    let mut live_artifacts = HashSet::new();
    let mut live_analyses = HashSet::new();
    for entry in std::fs::read_dir(cache_dir).map_err(CacheError::io(cache_dir))? {
        let path = entry.map_err(CacheError::io(cache_dir))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(manifest) = CacheManifest::load(&path) else {
            warn!(path = %path.display(), "ignoring unreadable cache manifest");
            continue;
        };
        stats.manifests += 1;
        for entry in manifest.entries {
            live_artifacts.insert(entry.last_artifact_fingerprint.to_string());
            live_analyses.insert(analysis_key(&entry.file_path, &entry.content_hash).to_string());
        }
    }

    let blobs = BlobStore::new(cache_dir);
    stats.removed_artifacts = blobs.gc(ARTIFACTS_SUBDIR, &live_artifacts)?;
    stats.removed_analyses = blobs.gc(ANALYSIS_SUBDIR, &live_analyses)?;
    debug!(?stats, "cache garbage collected");
    Ok(stats)
}
