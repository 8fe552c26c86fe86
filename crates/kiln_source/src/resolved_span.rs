//! Human-readable resolved source locations with line/column coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A span resolved to human-readable line/column coordinates.
///
/// All line and column values are 1-indexed for display to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSpan {
    /// The normalized path of the source file.
    pub file_path: String,
    /// The starting line number (1-indexed).
    pub start_line: u32,
    /// The starting column number (1-indexed).
    pub start_col: u32,
    /// The ending line number (1-indexed).
    pub end_line: u32,
    /// The ending column number (1-indexed).
    pub end_col: u32,
}

impl fmt::Display for ResolvedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.start_line, self.start_col)
    }
}
