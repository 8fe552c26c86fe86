//! Errors that abort graph construction.

use kiln_common::{CanonicalId, CanonicalIdError};
use kiln_source::Span;
use std::collections::BTreeSet;

/// A fatal dependency-graph error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Definitions depend on each other in a cycle.
    #[error("circular dependency: {}", render_chain(.chain))]
    CircularDependency {
        /// The cycle in traversal order; the first ID is repeated at the end.
        chain: Vec<CanonicalId>,
    },

    /// A reference names nothing the importer can see.
    #[error("`{importer}` references `{target}`, which cannot be resolved: {reason}")]
    MissingImport {
        /// The definition or binding holding the reference.
        importer: CanonicalId,
        /// The unresolved name or module specifier.
        target: String,
        /// Why resolution failed.
        reason: String,
        /// Where the reference appears in the importer's file.
        span: Span,
    },

    /// A definition could not be given a canonical ID.
    #[error(transparent)]
    CanonicalId(#[from] CanonicalIdError),
}

impl GraphError {
    /// Every file involved in the error, sorted and deduplicated.
    pub fn related_files(&self) -> Vec<String> {
        let files: BTreeSet<String> = match self {
            GraphError::CircularDependency { chain } => {
                chain.iter().map(|id| id.file_path().to_string()).collect()
            }
            GraphError::MissingImport { importer, .. } => {
                std::iter::once(importer.file_path().to_string()).collect()
            }
            GraphError::CanonicalId(_) => BTreeSet::new(),
        };
        files.into_iter().collect()
    }
}

/// Renders a chain as `a -> b -> a`.
pub fn render_chain(chain: &[CanonicalId]) -> String {
    chain
        .iter()
        .map(CanonicalId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::parse_canonical_id;

    #[test]
    fn cycle_message_lists_full_chain() {
        let a = parse_canonical_id("a.ts::X").unwrap();
        let b = parse_canonical_id("b.ts::Y").unwrap();
        let err = GraphError::CircularDependency {
            chain: vec![a.clone(), b, a],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency: a.ts::X -> b.ts::Y -> a.ts::X"
        );
        assert_eq!(err.related_files(), vec!["a.ts", "b.ts"]);
    }
}
