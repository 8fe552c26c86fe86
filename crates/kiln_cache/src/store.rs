//! The fingerprint store of one build configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kiln_analyzer::ModuleAnalysis;
use kiln_common::{CanonicalId, ContentHash};
use tracing::{debug, info};

use crate::blob::{BlobStore, ANALYSIS_SUBDIR, ARTIFACTS_SUBDIR};
use crate::error::CacheError;
use crate::manifest::{CacheEntry, CacheManifest};
use crate::payload::FilePayload;

/// The blob key of a cached analysis.
///
/// The file key is part of the key because analyses embed their path.
pub fn analysis_key(file_key: &str, content_hash: &ContentHash) -> ContentHash {
    ContentHash::from_bytes(format!("{file_key}\0{content_hash}").as_bytes())
}

/// Cache state of one build configuration.
///
/// A store is explicit state owned by the caller and passed into every
/// build, so independent configurations never share entries. Builds stage
/// new blobs and entries; nothing reaches disk until [`CacheStore::save`],
/// which the builder calls only after a successful build. Watch sessions
/// keep one store alive across rebuilds.
#[derive(Debug)]
pub struct CacheStore {
    manifest_path: PathBuf,
    config_fingerprint: ContentHash,
    entries: BTreeMap<String, CacheEntry>,
    blobs: BlobStore,
    pending: Vec<(&'static str, ContentHash, Vec<u8>)>,
}

impl CacheStore {
    /// Loads the store of `config_name` from `cache_dir`.
    ///
    /// A missing, unreadable or incompatible manifest (other format version
    /// or configuration fingerprint) yields an empty store, so the next
    /// build treats every file as a miss.
    pub fn load(cache_dir: &Path, config_name: &str, config_fingerprint: ContentHash) -> Self {
        let manifest_path = CacheManifest::path(cache_dir, config_name);
        let entries = match CacheManifest::load(&manifest_path) {
            Some(manifest) if manifest.is_compatible(&config_fingerprint) => manifest
                .entries
                .into_iter()
                .map(|entry| (entry.file_path.clone(), entry))
                .collect(),
            Some(_) => {
                info!(config = config_name, "cache manifest is stale, starting fresh");
                BTreeMap::new()
            }
            None => {
                debug!(config = config_name, "no usable cache manifest");
                BTreeMap::new()
            }
        };
        Self {
            manifest_path,
            config_fingerprint,
            entries,
            blobs: BlobStore::new(cache_dir),
            pending: Vec::new(),
        }
    }

    /// The configuration fingerprint the store was loaded for.
    pub fn config_fingerprint(&self) -> ContentHash {
        self.config_fingerprint
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no file is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached entry of a file.
    pub fn entry(&self, file_key: &str) -> Option<&CacheEntry> {
        self.entries.get(file_key)
    }

    /// Loads the artifact payload of a cached file.
    ///
    /// Returns `None` when the file is not cached or its blob is unreadable.
    pub fn load_payload(&self, file_key: &str) -> Option<FilePayload> {
        let entry = self.entries.get(file_key)?;
        let bytes = self.read_blob(ARTIFACTS_SUBDIR, &entry.last_artifact_fingerprint)?;
        FilePayload::decode(&bytes)
    }

    /// Loads a cached analysis of the file with the given content hash.
    pub fn load_analysis(&self, file_key: &str, content_hash: &ContentHash) -> Option<ModuleAnalysis> {
        let bytes = self.read_blob(ANALYSIS_SUBDIR, &analysis_key(file_key, content_hash))?;
        let analysis: ModuleAnalysis = serde_json::from_slice(&bytes).ok()?;
        (analysis.content_hash == *content_hash).then_some(analysis)
    }

    /// Stages an analysis blob for the next save.
    pub fn stage_analysis(&mut self, file_key: &str, analysis: &ModuleAnalysis) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(analysis).map_err(CacheError::serialization)?;
        let key = analysis_key(file_key, &analysis.content_hash);
        self.pending.push((ANALYSIS_SUBDIR, key, bytes));
        Ok(())
    }

    /// Records a freshly built file and stages its payload blob.
    pub fn stage_file(
        &mut self,
        file_key: &str,
        content_hash: ContentHash,
        canonical_ids: Vec<CanonicalId>,
        payload: &FilePayload,
    ) -> Result<(), CacheError> {
        let (bytes, fingerprint) = payload.encode()?;
        self.pending.push((ARTIFACTS_SUBDIR, fingerprint, bytes));
        self.entries.insert(
            file_key.to_string(),
            CacheEntry {
                file_path: file_key.to_string(),
                content_hash,
                canonical_ids,
                last_artifact_fingerprint: fingerprint,
            },
        );
        Ok(())
    }

    /// Drops entries of files that are no longer part of the build.
    pub fn retain_files(&mut self, files: &BTreeSet<String>) {
        self.entries.retain(|file, _| files.contains(file));
    }

    /// Forgets one file so the next build evaluates it again.
    pub fn remove_file(&mut self, file_key: &str) -> Option<CacheEntry> {
        self.entries.remove(file_key)
    }

    /// Drops staged blobs, e.g. after a failed build.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Persists the store: staged blobs first, then the manifest in one
    /// atomic replace.
    pub fn save(&mut self) -> Result<(), CacheError> {
        for (subdir, key, bytes) in self.pending.drain(..) {
            self.blobs.write(subdir, &key, &bytes)?;
        }
        let manifest = CacheManifest {
            entries: self.entries.values().cloned().collect(),
            ..CacheManifest::new(self.config_fingerprint)
        };
        manifest.save(&self.manifest_path)?;
        debug!(
            path = %self.manifest_path.display(),
            entries = manifest.entries.len(),
            "saved cache manifest"
        );
        Ok(())
    }

    fn read_blob(&self, subdir: &str, key: &ContentHash) -> Option<Vec<u8>> {
        self.pending
            .iter()
            .rev()
            .find(|(s, k, _)| *s == subdir && k == key)
            .map(|(_, _, bytes)| bytes.clone())
            .or_else(|| self.blobs.read(subdir, key))
    }
}
