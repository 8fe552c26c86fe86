//! Incremental build cache for the Kiln builder.
//!
//! Each build configuration owns a [`CacheStore`]: a JSON manifest with one
//! [`CacheEntry`] per source file plus content-addressed blobs holding the
//! evaluated [`FilePayload`] of each file and its cached module analysis.
//! [`classify`] compares a build's files against the store and splits them
//! into hits (reused), misses (re-evaluated, propagated to dependents) and
//! skips (excluded by configuration). The store is written only after a
//! successful build, blobs first and the manifest last in one atomic rename.

#![warn(missing_docs)]

pub mod blob;
pub mod classify;
pub mod error;
pub mod gc;
pub mod manifest;
pub mod payload;
pub mod store;

pub use classify::{classify, Classification, MissReason};
pub use error::CacheError;
pub use gc::{collect_garbage, GcStats};
pub use manifest::{CacheEntry, CacheManifest, MANIFEST_FORMAT_VERSION};
pub use payload::FilePayload;
pub use store::CacheStore;
