//! Parallel module analysis with the analysis cache.

use kiln_analyzer::{Analyzer, ModuleAnalysis};
use kiln_cache::CacheStore;
use kiln_common::ContentHash;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, Location, Severity};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::discover::SourceFile;
use crate::error::BuildError;

/// One analyzed file.
#[derive(Debug)]
pub struct AnalyzedFile {
    /// The file's key.
    pub key: String,
    /// Hash of the file's bytes.
    pub content_hash: ContentHash,
    /// The analysis.
    pub analysis: ModuleAnalysis,
    /// `true` when the analysis came from the cache.
    pub cached: bool,
}

/// Reads and analyzes every file in parallel.
///
/// Analyses whose content hash is cached are reused. Errors from all files
/// are collected into one [`BuildError::Analysis`]; warnings stay in the
/// returned analyses.
pub fn analyze_files(
    files: &[SourceFile],
    analyzer: &dyn Analyzer,
    store: &CacheStore,
) -> Result<Vec<AnalyzedFile>, BuildError> {
    let results: Vec<Result<AnalyzedFile, BuildError>> = files
        .par_iter()
        .map(|file| analyze_one(file, analyzer, store))
        .collect();

    let mut analyzed = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(file) => {
                errors.extend(
                    file.analysis
                        .diagnostics
                        .iter()
                        .filter(|d| d.severity == Severity::Error)
                        .cloned(),
                );
                analyzed.push(file);
            }
            Err(BuildError::Analysis { diagnostics }) => errors.extend(diagnostics),
            Err(other) => return Err(other),
        }
    }
    if !errors.is_empty() {
        return Err(BuildError::Analysis { diagnostics: errors });
    }

    let cached = analyzed.iter().filter(|f| f.cached).count();
    debug!(files = analyzed.len(), cached, "analysis finished");
    Ok(analyzed)
}

fn analyze_one(file: &SourceFile, analyzer: &dyn Analyzer, store: &CacheStore) -> Result<AnalyzedFile, BuildError> {
    let bytes = std::fs::read(&file.path).map_err(|source| BuildError::Read {
        path: file.path.clone().into(),
        source,
    })?;
    let content_hash = ContentHash::from_bytes(&bytes);

    if let Some(mut analysis) = store.load_analysis(&file.key, &content_hash) {
        trace!(file = %file.key, "analysis cache hit");
        analysis.file_path = file.path.clone();
        return Ok(AnalyzedFile {
            key: file.key.clone(),
            content_hash,
            analysis,
            cached: true,
        });
    }

    let source = String::from_utf8(bytes).map_err(|err| BuildError::Analysis {
        diagnostics: vec![Diagnostic::error(
            DiagnosticCode::AnalysisParseError,
            format!("`{}` is not valid UTF-8: {}", file.key, err.utf8_error()),
        )
        .with_location(Location::file(&file.key))
        .with_help("save the file as UTF-8")],
    })?;
    let mut analysis = analyzer
        .analyze(&file.path, &source)
        .map_err(|err| BuildError::Analysis {
            diagnostics: relocate(err.diagnostics, &file.path, &file.key),
        })?;
    analysis.content_hash = content_hash;
    analysis.diagnostics = relocate(analysis.diagnostics, &file.path, &file.key);
    Ok(AnalyzedFile {
        key: file.key.clone(),
        content_hash,
        analysis,
        cached: false,
    })
}

/// Rewrites diagnostic locations from the absolute path to the file key.
fn relocate(mut diagnostics: Vec<Diagnostic>, path: &str, key: &str) -> Vec<Diagnostic> {
    for diag in &mut diagnostics {
        if let Some(location) = &mut diag.location {
            if location.file_path == path {
                location.file_path = key.to_string();
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_analyzer::SourceAnalyzer;

    fn write(dir: &std::path::Path, name: &str, source: &str) -> SourceFile {
        let path = dir.join(name);
        std::fs::write(&path, source).unwrap();
        SourceFile {
            path: kiln_common::normalize_path(&path.to_string_lossy()),
            key: name.to_string(),
        }
    }

    #[test]
    fn collects_errors_from_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::load(&dir.path().join("cache"), "default", ContentHash::from_bytes(b"c"));
        let files = vec![
            write(dir.path(), "a.ts", "const = ;"),
            write(
                dir.path(),
                "b.ts",
                "import { gql } from \"@/graphql-system\";\nfunction f() { if (flag) { return gql.fragment(\"User\", { fields: [] }); } }",
            ),
            write(dir.path(), "c.ts", "export const ok = 1;"),
        ];
        let Err(BuildError::Analysis { diagnostics }) = analyze_files(&files, &SourceAnalyzer, &store) else {
            panic!("expected an analysis error");
        };
        let files: Vec<&str> = diagnostics
            .iter()
            .filter_map(|d| d.location.as_ref().map(|l| l.file_path.as_str()))
            .collect();
        assert!(files.contains(&"a.ts"));
        assert!(files.contains(&"b.ts"));
        assert!(diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::AnalysisNonTopLevelDefinition));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::load(&dir.path().join("cache"), "default", ContentHash::from_bytes(b"c"));
        let path = dir.path().join("latin1.ts");
        std::fs::write(&path, b"export const name = \"caf\xe9\";").unwrap();
        let files = vec![SourceFile {
            path: kiln_common::normalize_path(&path.to_string_lossy()),
            key: "latin1.ts".to_string(),
        }];
        let Err(BuildError::Analysis { diagnostics }) = analyze_files(&files, &SourceAnalyzer, &store) else {
            panic!("expected an analysis error");
        };
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::AnalysisParseError);
        assert_eq!(diagnostics[0].location.as_ref().unwrap().file_path, "latin1.ts");
        assert!(diagnostics[0].message.contains("not valid UTF-8"));
    }

    #[test]
    fn reuses_cached_analyses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        let fingerprint = ContentHash::from_bytes(b"c");
        let files = vec![write(dir.path(), "a.ts", "export const x = 1;")];

        let mut store = CacheStore::load(&cache, "default", fingerprint);
        let first = analyze_files(&files, &SourceAnalyzer, &store).unwrap();
        assert!(!first[0].cached);
        store.stage_analysis("a.ts", &first[0].analysis).unwrap();
        store.save().unwrap();

        let store = CacheStore::load(&cache, "default", fingerprint);
        let second = analyze_files(&files, &SourceAnalyzer, &store).unwrap();
        assert!(second[0].cached);
        assert_eq!(second[0].analysis, first[0].analysis);
    }
}
