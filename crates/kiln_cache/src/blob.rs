//! Content-addressed binary blob storage.
//!
//! Blobs (per-file artifact payloads, cached module analyses) live under
//! `<cache_dir>/<subdir>/<key>.bin`. Each blob starts with a length-prefixed
//! bincode header carrying magic bytes, the format version and a checksum
//! of the payload. Any mismatch makes the blob unreadable, which callers
//! treat as a cache miss.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Subdirectory for per-file artifact payloads.
pub const ARTIFACTS_SUBDIR: &str = "artifacts";

/// Subdirectory for cached module analyses.
pub const ANALYSIS_SUBDIR: &str = "analysis";

const BLOB_MAGIC: [u8; 4] = *b"KILN";

/// Bumped on any change to the header or payload encoding.
pub const BLOB_FORMAT_VERSION: u32 = 1;

const BLOB_EXT: &str = "bin";

/// Header prepended to every blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobHeader {
    /// Must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Blob format version.
    pub format_version: u32,
    /// Hash of the payload bytes.
    pub checksum: ContentHash,
}

/// Reads and writes header-validated blobs below a cache directory.
#[derive(Debug, Clone)]
pub struct BlobStore {
    cache_dir: PathBuf,
}

impl BlobStore {
    /// Creates a blob store rooted at `cache_dir`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Returns the file path of the blob with the given key.
    pub fn blob_path(&self, subdir: &str, key: &str) -> PathBuf {
        self.cache_dir.join(subdir).join(format!("{key}.{BLOB_EXT}"))
    }

    /// Writes `data` under `key`, replacing any previous blob atomically.
    pub fn write(&self, subdir: &str, key: &ContentHash, data: &[u8]) -> Result<(), CacheError> {
        let dir = self.cache_dir.join(subdir);
        std::fs::create_dir_all(&dir).map_err(CacheError::io(&dir))?;

        let header = BlobHeader {
            magic: BLOB_MAGIC,
            format_version: BLOB_FORMAT_VERSION,
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(CacheError::serialization)?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        write_atomic(&self.blob_path(subdir, &key.to_string()), &output)
    }

    /// Reads the payload stored under `key`.
    ///
    /// Returns `None` when the blob is missing, truncated, carries the wrong
    /// magic or version, or fails its checksum.
    pub fn read(&self, subdir: &str, key: &ContentHash) -> Option<Vec<u8>> {
        let raw = std::fs::read(self.blob_path(subdir, &key.to_string())).ok()?;
        if raw.len() < 4 {
            return None;
        }
        let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
        if raw.len() < 4 + header_len {
            return None;
        }
        let (header, _): (BlobHeader, usize) =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard()).ok()?;
        if header.magic != BLOB_MAGIC || header.format_version != BLOB_FORMAT_VERSION {
            return None;
        }
        let payload = &raw[4 + header_len..];
        if ContentHash::from_bytes(payload) != header.checksum {
            return None;
        }
        Some(payload.to_vec())
    }

    /// Deletes every blob in `subdir` whose key is not in `live`.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, subdir: &str, live: &HashSet<String>) -> Result<usize, CacheError> {
        let dir = self.cache_dir.join(subdir);
        if !dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in std::fs::read_dir(&dir).map_err(CacheError::io(&dir))? {
            let path = entry.map_err(CacheError::io(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !live.contains(stem) {
                std::fs::remove_file(&path).map_err(CacheError::io(&path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Writes `bytes` to a uniquely named temp file next to `path` and
/// renames it over `path`. Concurrent writers never share a temp file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(CacheError::io(dir))?;
    tmp.write_all(bytes).map_err(CacheError::io(tmp.path()))?;
    tmp.persist(path).map_err(|e| CacheError::io(path)(e.error))?;
    Ok(())
}
