//! Where a diagnostic points: a file, an in-file path, and optionally a span.

use kiln_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The location a diagnostic refers to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The normalized file path.
    pub file_path: String,
    /// The in-file path of the definition involved, if any (e.g. `queries.byId`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_path: Option<String>,
    /// The byte range within the file, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Location {
    /// A location naming only a file.
    pub fn file(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ast_path: None,
            span: None,
        }
    }

    /// Sets the in-file path.
    pub fn with_ast_path(mut self, ast_path: impl Into<String>) -> Self {
        self.ast_path = Some(ast_path.into());
        self
    }

    /// Sets the byte span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ast_path {
            Some(path) => write!(f, "{}::{}", self.file_path, path),
            None => f.write_str(&self.file_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_ast_path() {
        assert_eq!(Location::file("src/a.ts").to_string(), "src/a.ts");
        assert_eq!(
            Location::file("src/a.ts").with_ast_path("queries.byId").to_string(),
            "src/a.ts::queries.byId"
        );
    }

    #[test]
    fn serializes_camel_case_and_skips_empty() {
        let json = serde_json::to_string(&Location::file("a.ts").with_ast_path("x")).unwrap();
        assert_eq!(json, r#"{"filePath":"a.ts","astPath":"x"}"#);
    }
}
