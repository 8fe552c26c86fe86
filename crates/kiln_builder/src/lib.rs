//! The Kiln build orchestrator.
//!
//! A [`Builder`] turns the source files selected by one resolved
//! configuration into a [`BuilderArtifact`](kiln_artifact::BuilderArtifact):
//!
//! 1. [`discover`] walks the project and applies include/exclude globs.
//! 2. [`analyze_files`] parses every file in parallel, reusing cached analyses.
//! 3. The dependency graph is built and files are classified as hits or misses.
//! 4. [`plan_chunks`] groups misses into chunks scheduled in waves.
//! 5. Each chunk is synthesized and executed under a timeout by [`run_chunk`].
//! 6. [`assemble`] merges reused and fresh elements and checks operation names.
//!
//! The cache is saved only when a build succeeds.

#![warn(missing_docs)]

pub mod analyze;
pub mod assemble;
pub mod build;
pub mod cancel;
pub mod discover;
pub mod error;
pub mod execute;
pub mod plan;
pub mod session;

pub use analyze::{analyze_files, AnalyzedFile};
pub use assemble::{assemble, check_operation_names, Assembly};
pub use build::Builder;
pub use cancel::CancellationToken;
pub use discover::{discover, Discovered, SourceFile};
pub use error::BuildError;
pub use execute::run_chunk;
pub use plan::{plan_chunks, ChunkStrategy, Schedule};
pub use session::{write_artifact, BuildSession};
