//! Structured build failures.

use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_common::{CanonicalId, CanonicalIdError, InternalError};
use kiln_config::ConfigError;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, Location, Severity};
use kiln_eval::LoadError;
use kiln_graph::GraphError;

/// A build that did not produce an artifact.
///
/// Every variant maps to a stable [`DiagnosticCode`]; [`to_diagnostics`]
/// turns the error into renderable diagnostics with locations, help text
/// and the files involved.
///
/// [`to_diagnostics`]: BuildError::to_diagnostics
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An injected module could not be loaded.
    #[error(transparent)]
    Injected(LoadError),

    /// A source file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// The unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A canonical ID could not be formed for a discovered file.
    #[error(transparent)]
    CanonicalId(#[from] CanonicalIdError),

    /// One or more files failed analysis.
    #[error("analysis failed with {} error(s)", .diagnostics.len())]
    Analysis {
        /// Error diagnostics from every failing file.
        diagnostics: Vec<Diagnostic>,
    },

    /// The dependency graph could not be built.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Elements failed to evaluate in a strict build.
    #[error("{} element(s) failed to evaluate", .diagnostics.len())]
    Evaluation {
        /// One diagnostic per failed element or chunk.
        diagnostics: Vec<Diagnostic>,
    },

    /// Two operations share a name.
    #[error("operation name `{name}` is used by {}", sources.iter().map(CanonicalId::as_str).collect::<Vec<_>>().join(", "))]
    DuplicateOperation {
        /// The shared operation name.
        name: String,
        /// Every definition declaring it, sorted.
        sources: Vec<CanonicalId>,
    },

    /// The cache store could not be persisted.
    #[error("cache: {0}")]
    Cache(#[from] CacheError),

    /// The artifact could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        /// The output path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The build was cancelled.
    #[error("build cancelled")]
    Cancelled,

    /// A builder invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl BuildError {
    /// The stable code of the error.
    pub fn code(&self) -> DiagnosticCode {
        match self {
            BuildError::Config(ConfigError::MissingSchema { .. }) => DiagnosticCode::ConfigMissingSchema,
            BuildError::Config(_) | BuildError::Injected(_) => DiagnosticCode::ConfigInvalid,
            BuildError::Read { .. } | BuildError::Cache(_) => DiagnosticCode::FingerprintFailed,
            BuildError::CanonicalId(err) => canonical_id_code(err),
            BuildError::Analysis { diagnostics } => diagnostics
                .first()
                .map(|d| d.code)
                .unwrap_or(DiagnosticCode::AnalysisParseError),
            BuildError::Graph(GraphError::CircularDependency { .. }) => DiagnosticCode::GraphCircularDependency,
            BuildError::Graph(GraphError::MissingImport { .. }) => DiagnosticCode::GraphMissingImport,
            BuildError::Graph(GraphError::CanonicalId(err)) => canonical_id_code(err),
            BuildError::Evaluation { diagnostics } => diagnostics
                .first()
                .map(|d| d.code)
                .unwrap_or(DiagnosticCode::ElementEvaluationFailed),
            BuildError::DuplicateOperation { .. } => DiagnosticCode::DocDuplicate,
            BuildError::Write { .. } => DiagnosticCode::WriteFailed,
            BuildError::Cancelled => DiagnosticCode::BuildCancelled,
            BuildError::Internal(_) => DiagnosticCode::InternalInvariant,
        }
    }

    /// A one-line suggestion for fixing the error.
    pub fn hint(&self) -> Option<String> {
        let hint = match self {
            BuildError::Config(ConfigError::MissingSchema { .. }) => {
                "create the schema file or fix the path in `[schemas.<name>].schema`"
            }
            BuildError::Config(ConfigError::UnknownSchema(_)) => "pick one of the `[schemas.<name>]` tables",
            BuildError::Config(_) => "check `kiln.toml`",
            BuildError::Injected(_) => "each `[builder.inject]` entry must point to a JSON object",
            BuildError::Graph(GraphError::CircularDependency { .. }) => {
                "break the cycle by moving shared fields into a separate definition"
            }
            BuildError::Graph(GraphError::MissingImport { .. }) => {
                "check the import list, the target's exports and `[builder.aliases]`"
            }
            BuildError::Graph(GraphError::CanonicalId(_)) | BuildError::CanonicalId(_) => {
                "set `[builder].base_dir` or keep sources under the project root"
            }
            BuildError::DuplicateOperation { .. } => "rename one of the operations",
            BuildError::Evaluation { .. } => "fix the failing definitions or build with `--partial`",
            BuildError::Cache(_) => "run `kiln clean --all` to reset the cache",
            BuildError::Read { .. }
            | BuildError::Analysis { .. }
            | BuildError::Write { .. }
            | BuildError::Cancelled
            | BuildError::Internal(_) => return None,
        };
        Some(hint.to_string())
    }

    /// Every file involved in the error, sorted and deduplicated.
    pub fn related_files(&self) -> Vec<String> {
        let mut files: Vec<String> = match self {
            BuildError::Graph(err) => err.related_files(),
            BuildError::DuplicateOperation { sources, .. } => {
                sources.iter().map(|id| id.file_path().to_string()).collect()
            }
            BuildError::Analysis { diagnostics } | BuildError::Evaluation { diagnostics } => diagnostics
                .iter()
                .filter_map(|d| d.location.as_ref().map(|l| l.file_path.clone()))
                .collect(),
            BuildError::Read { path, .. } | BuildError::Write { path, .. } => {
                vec![path.display().to_string()]
            }
            BuildError::Config(ConfigError::MissingSchema { path, .. }) => vec![path.display().to_string()],
            _ => Vec::new(),
        };
        files.sort();
        files.dedup();
        files
    }

    /// A single diagnostic summarizing the error.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.code(), self.to_string());
        match self {
            BuildError::Graph(GraphError::MissingImport { importer, span, .. }) => {
                diag = diag.with_location(
                    Location::file(importer.file_path())
                        .with_ast_path(importer.in_file_path())
                        .with_span(*span),
                );
            }
            BuildError::Graph(GraphError::CircularDependency { chain }) => {
                if let Some(first) = chain.first() {
                    diag = diag
                        .with_location(Location::file(first.file_path()).with_ast_path(first.in_file_path()));
                }
            }
            BuildError::DuplicateOperation { sources, .. } => {
                if let Some(first) = sources.first() {
                    diag = diag
                        .with_location(Location::file(first.file_path()).with_ast_path(first.in_file_path()));
                }
            }
            _ => {}
        }
        for file in self.related_files() {
            diag = diag.with_related(file);
        }
        if let Some(hint) = self.hint() {
            diag = diag.with_help(hint);
        }
        diag
    }

    /// Every diagnostic carried by the error.
    ///
    /// Aggregated failures (analysis, strict evaluation) yield their
    /// individual diagnostics; everything else yields [`to_diagnostic`].
    ///
    /// [`to_diagnostic`]: BuildError::to_diagnostic
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            BuildError::Analysis { diagnostics } | BuildError::Evaluation { diagnostics } => diagnostics
                .iter()
                .cloned()
                .map(|mut d| {
                    d.severity = Severity::Error;
                    d
                })
                .collect(),
            _ => vec![self.to_diagnostic()],
        }
    }
}

fn canonical_id_code(err: &CanonicalIdError) -> DiagnosticCode {
    match err {
        CanonicalIdError::RequiresAbsolutePath { .. } => DiagnosticCode::CanonicalIdRequiresAbsolutePath,
        CanonicalIdError::Invalid { .. } => DiagnosticCode::CanonicalIdInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::parse_canonical_id;
    use kiln_source::Span;

    fn id(s: &str) -> CanonicalId {
        parse_canonical_id(s).unwrap()
    }

    #[test]
    fn duplicate_operation_lists_sources() {
        let err = BuildError::DuplicateOperation {
            name: "GetUser".into(),
            sources: vec![id("a.ts::q"), id("b.ts::q")],
        };
        assert_eq!(err.code(), DiagnosticCode::DocDuplicate);
        assert_eq!(err.to_string(), "operation name `GetUser` is used by a.ts::q, b.ts::q");
        assert_eq!(err.related_files(), vec!["a.ts", "b.ts"]);
        let diag = err.to_diagnostic();
        assert_eq!(diag.location.unwrap().ast_path.as_deref(), Some("q"));
        assert_eq!(diag.help, vec!["rename one of the operations"]);
    }

    #[test]
    fn missing_import_points_at_the_reference() {
        let err = BuildError::Graph(GraphError::MissingImport {
            importer: id("query.ts::getUser"),
            target: "missingFragment".into(),
            reason: "`./user` does not export it".into(),
            span: Span::new(10, 25),
        });
        assert_eq!(err.code(), DiagnosticCode::GraphMissingImport);
        let diag = err.to_diagnostic();
        let location = diag.location.unwrap();
        assert_eq!(location.file_path, "query.ts");
        assert_eq!(location.span, Some(Span::new(10, 25)));
        assert_eq!(diag.related, vec!["query.ts"]);
    }

    #[test]
    fn aggregated_errors_expand() {
        let err = BuildError::Evaluation {
            diagnostics: vec![
                Diagnostic::warning(DiagnosticCode::ElementEvaluationFailed, "a")
                    .with_location(Location::file("b.ts")),
                Diagnostic::warning(DiagnosticCode::RuntimeModuleLoadFailed, "b")
                    .with_location(Location::file("a.ts")),
            ],
        };
        assert_eq!(err.code(), DiagnosticCode::ElementEvaluationFailed);
        assert_eq!(err.related_files(), vec!["a.ts", "b.ts"]);
        let diags = err.to_diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn config_codes() {
        let err = BuildError::Config(ConfigError::MissingSchema {
            schema: "default".into(),
            path: PathBuf::from("/p/schema.graphql"),
        });
        assert_eq!(err.code(), DiagnosticCode::ConfigMissingSchema);
        assert_eq!(
            BuildError::Config(ConfigError::UnknownSchema("x".into())).code(),
            DiagnosticCode::ConfigInvalid
        );
        assert_eq!(BuildError::Cancelled.code(), DiagnosticCode::BuildCancelled);
    }
}
