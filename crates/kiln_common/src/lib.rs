//! Shared foundational types used across the Kiln definition builder.
//!
//! This crate provides content hashing for cache invalidation, canonical
//! definition identities, lexical path normalization, and the internal-error
//! result type used to signal builder bugs.

#![warn(missing_docs)]

pub mod canonical;
pub mod hash;
pub mod path;
pub mod result;

pub use canonical::{canonical_file_path, create_canonical_id, parse_canonical_id, CanonicalId, CanonicalIdError};
pub use hash::ContentHash;
pub use path::{is_absolute, normalize_path, relative_to};
pub use result::{InternalError, KilnResult};
