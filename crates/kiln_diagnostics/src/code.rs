//! Stable diagnostic codes grouped by pipeline stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The pipeline stage a diagnostic code belongs to.
///
/// The category decides how a failure is treated: configuration, analysis,
/// graph and assembly problems are fatal, evaluation problems are isolated
/// per element, infra problems indicate I/O trouble or builder bugs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Invalid options, unknown schema names, missing schema files.
    Configuration,
    /// Canonical identity construction.
    Identity,
    /// Per-file module analysis.
    Analysis,
    /// Cross-file reference resolution and ordering.
    Graph,
    /// Sandboxed evaluation of definitions.
    Evaluation,
    /// Artifact assembly.
    Assembly,
    /// Filesystem, hashing and internal invariants.
    Infra,
}

/// A stable, machine-readable diagnostic code.
///
/// Displayed and serialized in `SCREAMING_SNAKE_CASE`, e.g. `GRAPH_MISSING_IMPORT`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// The configuration file is malformed or fails validation.
    ConfigInvalid,
    /// A schema file listed in the configuration does not exist.
    ConfigMissingSchema,
    /// A canonical ID was requested for a relative path without a base directory.
    CanonicalIdRequiresAbsolutePath,
    /// A canonical ID string or component is malformed.
    CanonicalIdInvalid,
    /// A source file could not be tokenized or parsed.
    AnalysisParseError,
    /// A definition call sits in a position that is not statically reachable.
    AnalysisNonTopLevelDefinition,
    /// A `gql.<kind>` call names an unknown definition kind.
    AnalysisUnknownDefinitionKind,
    /// Two top-level bindings in one file share a name.
    AnalysisDuplicateBinding,
    /// An `export { name }` list names something the file never declares.
    AnalysisUnknownExport,
    /// A syntactic form the analyzer does not support.
    AnalysisUnsupportedSyntax,
    /// Definitions depend on each other in a cycle.
    GraphCircularDependency,
    /// A reference could not be resolved to a definition or module.
    GraphMissingImport,
    /// A single definition failed to evaluate.
    ElementEvaluationFailed,
    /// A chunk program could not be loaded or did not finish in time.
    RuntimeModuleLoadFailed,
    /// Two operations share a name.
    DocDuplicate,
    /// Hashing or cache persistence failed.
    FingerprintFailed,
    /// Writing an output file failed.
    WriteFailed,
    /// A builder invariant was violated.
    InternalInvariant,
    /// The build was cancelled before it finished.
    BuildCancelled,
}

impl DiagnosticCode {
    /// Returns the stable string form of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::ConfigInvalid => "CONFIG_INVALID",
            DiagnosticCode::ConfigMissingSchema => "CONFIG_MISSING_SCHEMA",
            DiagnosticCode::CanonicalIdRequiresAbsolutePath => "CANONICAL_ID_REQUIRES_ABSOLUTE_PATH",
            DiagnosticCode::CanonicalIdInvalid => "CANONICAL_ID_INVALID",
            DiagnosticCode::AnalysisParseError => "ANALYSIS_PARSE_ERROR",
            DiagnosticCode::AnalysisNonTopLevelDefinition => "ANALYSIS_NON_TOP_LEVEL_DEFINITION",
            DiagnosticCode::AnalysisUnknownDefinitionKind => "ANALYSIS_UNKNOWN_DEFINITION_KIND",
            DiagnosticCode::AnalysisDuplicateBinding => "ANALYSIS_DUPLICATE_BINDING",
            DiagnosticCode::AnalysisUnknownExport => "ANALYSIS_UNKNOWN_EXPORT",
            DiagnosticCode::AnalysisUnsupportedSyntax => "ANALYSIS_UNSUPPORTED_SYNTAX",
            DiagnosticCode::GraphCircularDependency => "GRAPH_CIRCULAR_DEPENDENCY",
            DiagnosticCode::GraphMissingImport => "GRAPH_MISSING_IMPORT",
            DiagnosticCode::ElementEvaluationFailed => "ELEMENT_EVALUATION_FAILED",
            DiagnosticCode::RuntimeModuleLoadFailed => "RUNTIME_MODULE_LOAD_FAILED",
            DiagnosticCode::DocDuplicate => "DOC_DUPLICATE",
            DiagnosticCode::FingerprintFailed => "FINGERPRINT_FAILED",
            DiagnosticCode::WriteFailed => "WRITE_FAILED",
            DiagnosticCode::InternalInvariant => "INTERNAL_INVARIANT",
            DiagnosticCode::BuildCancelled => "BUILD_CANCELLED",
        }
    }

    /// Returns the pipeline stage this code belongs to.
    pub fn category(self) -> Category {
        match self {
            DiagnosticCode::ConfigInvalid | DiagnosticCode::ConfigMissingSchema => Category::Configuration,
            DiagnosticCode::CanonicalIdRequiresAbsolutePath | DiagnosticCode::CanonicalIdInvalid => {
                Category::Identity
            }
            DiagnosticCode::AnalysisParseError
            | DiagnosticCode::AnalysisNonTopLevelDefinition
            | DiagnosticCode::AnalysisUnknownDefinitionKind
            | DiagnosticCode::AnalysisDuplicateBinding
            | DiagnosticCode::AnalysisUnknownExport
            | DiagnosticCode::AnalysisUnsupportedSyntax => Category::Analysis,
            DiagnosticCode::GraphCircularDependency | DiagnosticCode::GraphMissingImport => Category::Graph,
            DiagnosticCode::ElementEvaluationFailed | DiagnosticCode::RuntimeModuleLoadFailed => {
                Category::Evaluation
            }
            DiagnosticCode::DocDuplicate => Category::Assembly,
            DiagnosticCode::FingerprintFailed
            | DiagnosticCode::WriteFailed
            | DiagnosticCode::InternalInvariant
            | DiagnosticCode::BuildCancelled => Category::Infra,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
