//! Artifact data model for the Kiln builder.
//!
//! Evaluating a definition produces an [`ArtifactElement`]: a closed union
//! over the four definition kinds, each carrying a `prebuild` payload with
//! its field selections, variables and (for operations) the rendered GraphQL
//! document. A build collects elements into a [`BuilderArtifact`] together
//! with a [`BuildReport`]. The runtime [`Value`] type is shared by the
//! evaluator and the cache.

#![warn(missing_docs)]

pub mod artifact;
pub mod element;
pub mod render;
pub mod selection;
pub mod value;

pub use artifact::{BuildReport, BuilderArtifact, CacheStats};
pub use element::{ArtifactElement, OperationPrebuild, OperationType, SelectionPrebuild, SlicePrebuild};
pub use render::render_document;
pub use selection::{ArgValue, FieldSelection, VariableDefinition};
pub use value::Value;
