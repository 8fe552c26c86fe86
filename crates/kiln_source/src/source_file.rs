//! Source file representation with line-start indexing for fast line/column lookup.

use crate::file_id::FileId;
use crate::span::Span;
use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};

/// Byte offsets of every line start in a text, for offset to line/column lookup.
///
/// The analyzer builds one per file so recorded locations carry line and
/// column numbers without keeping the text around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Indexes the line starts of `content`.
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Returns the byte offset at which the 1-indexed `line` starts.
    pub fn line_start(&self, line: u32) -> Option<u32> {
        self.line_starts.get(line.checked_sub(1)? as usize).copied()
    }

    /// Returns the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// A source file loaded into the build session.
pub struct SourceFile {
    /// The identifier for this file within the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The normalized path of this file (or a synthetic name for in-memory sources).
    pub path: String,
    /// The full text content of the file.
    pub content: String,
    /// Line-start index for the content.
    pub lines: LineIndex,
    /// Hash of the file content for cache invalidation.
    pub content_hash: ContentHash,
}

impl SourceFile {
    /// Creates a new `SourceFile` with precomputed line starts and content hash.
    pub fn new(id: FileId, path: String, content: String) -> Self {
        let lines = LineIndex::new(&content);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            id,
            path,
            content,
            lines,
            content_hash,
        }
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        self.lines.line_col(byte_offset)
    }

    /// Returns the text covered by `span`, clamped to the file.
    pub fn snippet(&self, span: Span) -> &str {
        let len = self.content.len();
        let start = (span.start as usize).min(len);
        let end = (span.end as usize).clamp(start, len);
        self.content.get(start..end).unwrap_or("")
    }

    /// Returns the text of the 1-indexed `line` without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let start = self.lines.line_start(line)? as usize;
        let rest = self.content.get(start..)?;
        let end = rest.find('\n').unwrap_or(rest.len());
        Some(rest[..end].trim_end_matches('\r'))
    }
}
