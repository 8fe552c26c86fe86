//! Errors that abort a whole chunk.

use std::path::PathBuf;
use std::time::Duration;

/// A chunk program could not be loaded or run to completion.
///
/// Reported as `RUNTIME_MODULE_LOAD_FAILED`; only the affected chunk is
/// aborted. Failures inside a single definition are not load errors, they
/// are recorded per element in the chunk output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The program imports a module that was not injected.
    #[error("module `{specifier}` is not provided to the sandbox")]
    MissingModule {
        /// The requested module specifier.
        specifier: String,
    },

    /// An injected module lacks a requested export.
    #[error("module `{specifier}` has no export named `{name}`")]
    MissingExport {
        /// The module specifier.
        specifier: String,
        /// The requested export.
        name: String,
    },

    /// An injected module file could not be read or is not a JSON object.
    #[error("cannot load injected module `{specifier}` from {}: {reason}", path.display())]
    InvalidModule {
        /// The module specifier.
        specifier: String,
        /// The file the module was read from.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A step reads a slot that is not available at that point.
    #[error("malformed chunk program: {0}")]
    MalformedProgram(String),

    /// The chunk did not finish within its time budget.
    #[error("chunk did not finish within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The evaluator panicked.
    #[error("evaluator panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = LoadError::MissingModule {
            specifier: "@/scalars".into(),
        };
        assert_eq!(err.to_string(), "module `@/scalars` is not provided to the sandbox");
        assert_eq!(
            LoadError::Timeout(Duration::from_millis(1500)).to_string(),
            "chunk did not finish within 1500ms"
        );
    }
}
