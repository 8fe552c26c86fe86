//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur while persisting or collecting the cache.
///
/// Reads are fail-safe and never produce these: a missing or damaged
/// manifest or blob is a cache miss. Only writes and garbage collection
/// surface errors, which the builder reports as `FINGERPRINT_FAILED`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be encoded for storage.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CacheError::Io { path, source }
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        CacheError::Serialization {
            reason: err.to_string(),
        }
    }
}
