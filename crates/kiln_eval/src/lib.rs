//! Sandboxed evaluation of definition chunks.
//!
//! The builder groups the nodes that need evaluation into chunks and turns
//! each chunk into a [`ChunkProgram`] with [`synthesize`]. An [`Evaluator`]
//! runs the program in isolation: it sees the program's own steps, the
//! materialized values of nodes outside the chunk, and the configured
//! [`InjectedModules`], nothing else.
//!
//! A failing step is reported in [`ChunkOutput::failures`] and poisons only
//! the steps that read it. Problems that prevent the chunk from running at
//! all are [`LoadError`]s.

#![warn(missing_docs)]

pub mod error;
pub mod injected;
mod interp;
mod intrinsics;
pub mod program;
pub mod sandbox;

use std::collections::BTreeMap;

use kiln_artifact::Value;
use kiln_common::CanonicalId;

pub use error::LoadError;
pub use injected::InjectedModules;
pub use program::{synthesize, ChunkProgram, ImportedValue, SlotRef, Step};
pub use sandbox::Sandbox;

/// The result of evaluating one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutput {
    /// Values of the steps that succeeded.
    pub values: BTreeMap<CanonicalId, Value>,
    /// Reasons for the steps that failed.
    pub failures: BTreeMap<CanonicalId, String>,
}

/// Runs chunk programs.
///
/// Implementations must be deterministic and must not reach anything
/// outside the program and the injected modules. The builder may call
/// `execute` from several threads at once.
pub trait Evaluator: Send + Sync {
    /// Evaluates every step of `program`.
    fn execute(&self, program: &ChunkProgram, injected: &InjectedModules) -> Result<ChunkOutput, LoadError>;
}
