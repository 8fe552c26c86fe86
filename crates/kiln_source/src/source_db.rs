//! Central database of the source files in a build session.

use crate::file_id::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::SourceFile;
use crate::span::Span;
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// The source database, owning loaded source text and resolving
/// file path + byte offsets to line/column coordinates for diagnostics.
#[derive(Default)]
pub struct SourceDb {
    files: Vec<SourceFile>,
    by_path: HashMap<String, FileId>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a source file from the filesystem under the given normalized name.
    pub fn load_file(&mut self, path: &Path, name: impl Into<String>) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.add_source(name, content))
    }

    /// Adds a source file from an in-memory string.
    ///
    /// Adding the same name twice replaces the earlier text.
    pub fn add_source(&mut self, name: impl Into<String>, content: String) -> FileId {
        let name = name.into();
        if let Some(&id) = self.by_path.get(&name) {
            self.files[id.index()] = SourceFile::new(id, name, content);
            return id;
        }
        let id = FileId::from_raw(self.files.len() as u32);
        self.by_path.insert(name.clone(), id);
        self.files.push(SourceFile::new(id, name, content));
        id
    }

    /// Returns the [`SourceFile`] for the given [`FileId`], if it exists.
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.index())
    }

    /// Looks a file up by its normalized path.
    pub fn file_by_path(&self, path: &str) -> Option<&SourceFile> {
        self.by_path.get(path).and_then(|&id| self.get_file(id))
    }

    /// Resolves a span in the named file to line/column coordinates.
    pub fn resolve_span(&self, path: &str, span: Span) -> Option<ResolvedSpan> {
        let file = self.file_by_path(path)?;
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        Some(ResolvedSpan {
            file_path: file.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }

    /// Returns the number of loaded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no files are loaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup_by_path() {
        let mut db = SourceDb::new();
        let id = db.add_source("src/a.ts", "hello world".to_string());
        assert_eq!(db.get_file(id).unwrap().content, "hello world");
        assert_eq!(db.file_by_path("src/a.ts").unwrap().id, id);
        assert!(db.file_by_path("src/b.ts").is_none());
    }

    #[test]
    fn re_adding_replaces_content() {
        let mut db = SourceDb::new();
        let first = db.add_source("a.ts", "one".to_string());
        let second = db.add_source("a.ts", "two".to_string());
        assert_eq!(first, second);
        assert_eq!(db.len(), 1);
        assert_eq!(db.file_by_path("a.ts").unwrap().content, "two");
    }

    #[test]
    fn resolve_span() {
        let mut db = SourceDb::new();
        db.add_source("test.ts", "abc\ndef\nghi".to_string());
        let resolved = db.resolve_span("test.ts", Span::new(4, 7)).unwrap();
        assert_eq!(resolved.file_path, "test.ts");
        assert_eq!((resolved.start_line, resolved.start_col), (2, 1));
        assert_eq!((resolved.end_line, resolved.end_col), (2, 3));
    }

    #[test]
    fn load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("user.ts");
        std::fs::write(&file_path, "export const a = 1;").unwrap();

        let mut db = SourceDb::new();
        let id = db.load_file(&file_path, "user.ts").unwrap();
        assert_eq!(db.get_file(id).unwrap().content, "export const a = 1;");
    }
}
