//! Cross-file dependency graph construction for Kiln.
//!
//! [`build_graph`] merges every [`ModuleAnalysis`](kiln_analyzer::ModuleAnalysis)
//! of a build into one [`DependencyGraph`] keyed by canonical ID. References
//! are resolved through import tables and re-exports; the builder intrinsic
//! and injected modules become scope entries instead of edges. The graph
//! must be acyclic: a cycle is reported with its full chain. On success the
//! graph carries a deterministic topological order.

#![warn(missing_docs)]

pub mod build;
mod cycle;
pub mod error;
pub mod graph;
mod order;
pub mod resolver;

pub use build::{build_graph, GraphOptions};
pub use error::{render_chain, GraphError};
pub use graph::{DependencyGraph, FileInfo, GraphNode, NodeKind, Resolved};
pub use resolver::{ModuleResolver, ModuleTarget, ResolverOptions};
