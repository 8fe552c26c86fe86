//! Parsing and validation of `kiln.toml` project configuration files.
//!
//! This crate reads the project configuration and produces a strongly-typed
//! [`ProjectConfig`]. Each `[schemas.<name>]` table is an independent build
//! configuration; [`resolve_schema`] merges it with the shared `[builder]`
//! settings into a [`ResolvedBuildConfig`] with compiled globs, absolute
//! directories and a configuration fingerprint for cache invalidation.

#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use filter::FileFilter;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_schema, ResolvedBuildConfig};
pub use types::*;
