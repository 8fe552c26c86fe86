//! How bad a diagnostic is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a build diagnostic.
///
/// Build failures are errors. Partial builds downgrade element failures to
/// warnings so the rest of the artifact can still be emitted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Tolerated problem, reported next to a successful artifact.
    Warning,
    /// Problem that fails the build.
    Error,
}

impl Severity {
    /// Whether this severity fails the build.
    pub fn is_error(self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Label used by the terminal and JSON renderers.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_outrank_warnings() {
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn wire_form_matches_label() {
        for severity in [Severity::Warning, Severity::Error] {
            let json = serde_json::to_string(&severity).unwrap();
            assert_eq!(json, format!("\"{}\"", severity.label()));
        }
    }
}
