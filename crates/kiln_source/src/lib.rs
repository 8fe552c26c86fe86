//! Source text management and location tracking for diagnostics.
//!
//! The analyzer records byte [`Span`]s relative to a single file so analyses
//! can be computed in parallel and cached independently. The [`SourceDb`]
//! owns the loaded text of a build and resolves spans to line/column
//! coordinates when diagnostics are rendered.

#![warn(missing_docs)]

pub mod file_id;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use file_id::FileId;
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::{LineIndex, SourceFile};
pub use span::Span;
