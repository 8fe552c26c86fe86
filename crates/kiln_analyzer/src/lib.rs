//! Module analysis for Kiln definition files.
//!
//! The analyzer turns one source file into a [`ModuleAnalysis`]: the
//! definitions declared by statically reachable `gql.<kind>(...)` calls, the
//! plain top-level bindings they may read, the file's imports and export
//! table, and any diagnostics. Analysis is a pure function of the file path
//! and text, so files are analyzed in parallel and results are cached by
//! content hash.
//!
//! The reference [`SourceAnalyzer`] understands a small JavaScript-shaped
//! module language. Other front ends can be plugged in through the
//! [`Analyzer`] trait.

#![warn(missing_docs)]

pub mod analysis;
pub mod ast;
mod collect;
mod expr;
pub mod lexer;
pub mod parser;
pub mod token;

pub use analysis::{
    Binding, Definition, DefinitionKind, ExportEntry, ImportBinding, ModuleAnalysis, RawReference,
    ReferenceTarget, SourceLocation, HELPER_METHODS,
};
pub use ast::{Expr, BUILDER_IDENT};

use kiln_common::ContentHash;
use kiln_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};

/// A file that could not be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to parse `{file_path}`: {count} syntax error(s)", count = .diagnostics.len())]
pub struct ParseError {
    /// The file that failed to parse.
    pub file_path: String,
    /// Every diagnostic reported for the file, syntax errors included.
    pub diagnostics: Vec<Diagnostic>,
}

/// Produces a [`ModuleAnalysis`] from one file's text.
///
/// Implementations must be pure: the same path and text always yield the
/// same analysis, and no state is shared between calls.
pub trait Analyzer: Send + Sync {
    /// Analyzes one file. Semantic problems are returned as diagnostics in
    /// the analysis; only unparseable input yields `Err`.
    fn analyze(&self, file_path: &str, source: &str) -> Result<ModuleAnalysis, ParseError>;
}

/// The built-in analyzer for the reference module language.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceAnalyzer;

impl Analyzer for SourceAnalyzer {
    fn analyze(&self, file_path: &str, source: &str) -> Result<ModuleAnalysis, ParseError> {
        analyze(file_path, source)
    }
}

/// Analyzes one file with the reference analyzer.
pub fn analyze(file_path: &str, source: &str) -> Result<ModuleAnalysis, ParseError> {
    let sink = DiagnosticSink::new();
    let tokens = lexer::lex(source, file_path, &sink);
    let ast = parser::Parser::new(tokens, source, file_path, &sink).parse_module();

    let parse_failed = sink
        .diagnostics()
        .iter()
        .any(|d| d.code == DiagnosticCode::AnalysisParseError);
    if parse_failed {
        return Err(ParseError {
            file_path: file_path.to_string(),
            diagnostics: sink.take_all(),
        });
    }

    let collected = collect::collect(file_path, source, ast, &sink);
    Ok(ModuleAnalysis {
        file_path: file_path.to_string(),
        content_hash: ContentHash::from_bytes(source.as_bytes()),
        definitions: collected.definitions,
        bindings: collected.bindings,
        imports: collected.imports,
        exports: collected.exports,
        diagnostics: sink.take_all(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_ok(source: &str) -> ModuleAnalysis {
        analyze("/repo/src/test.ts", source).expect("source should parse")
    }

    fn codes(analysis: &ModuleAnalysis) -> Vec<DiagnosticCode> {
        analysis.diagnostics.iter().map(|d| d.code).collect()
    }

    const QUERY: &str = r#"
import { gql } from "@/graphql-system";
import { userFragment as base } from "./user";

const shared = ["id"];
export const userFragment = gql.fragment("User", { fields: [...shared, "name"] });
export const queries = {
  byId: gql.operation("query", "GetUser", {
    variables: { id: "ID!" },
    fields: [gql.field("user", { id: "$id" }, [...base])],
  }),
  nested: { list: gql.slice("query", { fields: ["users"] }) },
};
"#;

    #[test]
    fn collects_definitions_with_in_file_paths() {
        let analysis = analyze_ok(QUERY);
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let paths: Vec<_> = analysis
            .definitions
            .iter()
            .map(|d| (d.kind, d.export_path.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                (DefinitionKind::Fragment, "userFragment"),
                (DefinitionKind::Operation, "queries.byId"),
                (DefinitionKind::Slice, "queries.nested.list"),
            ]
        );
        assert!(analysis.definitions.iter().all(|d| d.exported));
    }

    #[test]
    fn plain_bindings_reference_nested_definitions() {
        let analysis = analyze_ok(QUERY);
        let names: Vec<_> = analysis.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["shared", "queries"]);
        let queries = analysis.binding("queries").unwrap();
        let targets: Vec<_> = queries.raw_references.iter().map(|r| r.target.clone()).collect();
        assert_eq!(
            targets,
            vec![
                ReferenceTarget::Nested("queries.byId".into()),
                ReferenceTarget::Nested("queries.nested.list".into()),
            ]
        );
        assert!(!analysis.binding("shared").unwrap().exported);
    }

    #[test]
    fn raw_references_are_free_identifiers() {
        let analysis = analyze_ok(QUERY);
        let fragment = analysis.definition("userFragment").unwrap();
        let names: Vec<_> = fragment
            .raw_references
            .iter()
            .map(|r| r.target.to_string())
            .collect();
        assert_eq!(names, vec!["gql", "shared"]);

        let op = analysis.definition("queries.byId").unwrap();
        let names: Vec<_> = op.raw_references.iter().map(|r| r.target.to_string()).collect();
        assert_eq!(names, vec!["gql", "base"]);
    }

    #[test]
    fn imports_and_exports_recorded() {
        let analysis = analyze_ok(
            r#"
import { gql } from "@/graphql-system";
export { helper as aid } from "./helpers";
export * from "./more";
const local = 1;
export { local as renamed };
"#,
        );
        assert_eq!(analysis.imports.len(), 1);
        assert_eq!(analysis.imports[0].specifier, "@/graphql-system");
        assert_eq!(
            analysis.exports,
            vec![
                ExportEntry::ReExport {
                    exported: "aid".into(),
                    imported: "helper".into(),
                    specifier: "./helpers".into(),
                },
                ExportEntry::ReExportAll {
                    specifier: "./more".into()
                },
                ExportEntry::Local {
                    exported: "renamed".into(),
                    local: "local".into(),
                },
            ]
        );
        assert!(analysis.binding("local").unwrap().exported);
    }

    #[test]
    fn definitions_in_function_bodies_are_lifted() {
        let analysis = analyze_ok(
            r#"
import { gql } from "@/graphql-system";
export const factory = () => {
  const baseQuery = gql.operation("query", "Q", { fields: ["a"] });
  return baseQuery;
};
export const short = () => gql.fragment("User", { fields: ["id"] });
"#,
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let paths: Vec<_> = analysis.definitions.iter().map(|d| d.export_path.as_str()).collect();
        assert_eq!(paths, vec!["factory.arrow#0.baseQuery", "short.arrow#0"]);
        assert!(analysis.definition("factory.arrow#0.baseQuery").unwrap().exported);
        assert!(analysis.binding("factory").is_some());
    }

    #[test]
    fn function_locals_link_or_stay_unresolved() {
        let analysis = analyze_ok(
            r#"
import { gql } from "@/graphql-system";
export function build(limit) {
  const base = gql.fragment("User", { fields: ["id"] });
  const byId = gql.operation("query", "ById", {
    fields: [gql.field("user", { first: limit }, [base])],
  });
  return byId;
}
"#,
        );
        assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
        let by_id = analysis.definition("build.byId").unwrap();
        let targets: Vec<_> = by_id.raw_references.iter().map(|r| r.target.clone()).collect();
        assert!(targets.contains(&ReferenceTarget::Nested("build.base".into())));
        assert!(targets.contains(&ReferenceTarget::Identifier("gql".into())));
        assert!(!targets.contains(&ReferenceTarget::Identifier("limit".into())));
        assert!(!targets.contains(&ReferenceTarget::Identifier("base".into())));
    }

    #[test]
    fn definitions_in_branches_and_arrays_are_rejected() {
        let analysis = analyze_ok(
            r#"
import { gql } from "@/graphql-system";
if (flag) { const a = gql.fragment("A", { fields: ["x"] }); }
export const list = [gql.model("B", { fields: ["y"] })];
export const guarded = () => {
  if (flag) {
    return gql.fragment("C", { fields: ["z"] });
  }
};
"#,
        );
        assert!(analysis.definitions.is_empty());
        assert_eq!(
            codes(&analysis),
            vec![
                DiagnosticCode::AnalysisNonTopLevelDefinition,
                DiagnosticCode::AnalysisNonTopLevelDefinition,
                DiagnosticCode::AnalysisNonTopLevelDefinition,
            ]
        );
        assert!(analysis.has_errors());
    }

    #[test]
    fn nested_builder_calls_belong_to_their_parent() {
        let analysis = analyze_ok(
            r#"
export const op = gql.operation("query", "Q", {
  fields: [gql.field("user", {}, [...gql.fragment("User", { fields: ["id"] })])],
});
"#,
        );
        assert_eq!(analysis.definitions.len(), 1);
        assert!(analysis.diagnostics.is_empty());
    }

    #[test]
    fn unknown_definition_kind() {
        let analysis = analyze_ok(r#"export const x = gql.query("Q");"#);
        assert_eq!(codes(&analysis), vec![DiagnosticCode::AnalysisUnknownDefinitionKind]);
    }

    #[test]
    fn duplicate_bindings() {
        let analysis = analyze_ok(
            r#"
import { a } from "./a";
const a = 1;
function b() { return 1; }
const b = 2;
"#,
        );
        assert_eq!(
            codes(&analysis),
            vec![
                DiagnosticCode::AnalysisDuplicateBinding,
                DiagnosticCode::AnalysisDuplicateBinding,
            ]
        );
    }

    #[test]
    fn unknown_export() {
        let analysis = analyze_ok("export { missing };");
        assert_eq!(codes(&analysis), vec![DiagnosticCode::AnalysisUnknownExport]);
    }

    #[test]
    fn repeated_paths_get_suffixes() {
        let analysis = analyze_ok(
            r#"
export const q = {
  a: gql.fragment("A", { fields: ["x"] }),
  a: gql.fragment("A", { fields: ["y"] }),
};
"#,
        );
        let paths: Vec<_> = analysis.definitions.iter().map(|d| d.export_path.as_str()).collect();
        assert_eq!(paths, vec!["q.a", "q.a$1"]);
    }

    #[test]
    fn arrow_parameters_are_not_references() {
        let analysis = analyze_ok("const pick = (row) => row.id;\nconst other = (x) => shared;");
        assert!(analysis.binding("pick").unwrap().raw_references.is_empty());
        let other = &analysis.binding("other").unwrap().raw_references;
        assert_eq!(other[0].target, ReferenceTarget::Identifier("shared".into()));
    }

    #[test]
    fn block_declarations_stay_in_their_block() {
        let analysis = analyze_ok("const read = () => {\n  { const hidden = 1; }\n  return hidden;\n};");
        let refs = &analysis.binding("read").unwrap().raw_references;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, ReferenceTarget::Identifier("hidden".into()));
    }

    #[test]
    fn syntax_errors_fail_with_parse_error() {
        let err = analyze("/repo/bad.ts", "const = 1;\nconst b = ;").unwrap_err();
        assert_eq!(err.file_path, "/repo/bad.ts");
        assert_eq!(err.diagnostics.len(), 2);
        assert!(err.to_string().contains("2 syntax error(s)"));
    }

    #[test]
    fn out_of_range_numbers_are_syntax_errors() {
        let err = analyze("/repo/limits.ts", "export const limit = 1e999;\nexport const low = -1e999;").unwrap_err();
        assert_eq!(err.diagnostics.len(), 2);
        assert!(err
            .diagnostics
            .iter()
            .all(|d| d.code == DiagnosticCode::AnalysisParseError && d.message.contains("out of range")));
        assert!(analyze("/repo/limits.ts", "export const big = 1e300;").is_ok());
    }

    #[test]
    fn locations_carry_line_and_column() {
        let analysis = analyze_ok("\n  export const f = gql.fragment(\"A\", { fields: [] });");
        let def = &analysis.definitions[0];
        assert_eq!((def.location.line, def.location.column), (2, 20));
    }

    #[test]
    fn analysis_is_deterministic_and_serializable() {
        let first = analyze_ok(QUERY);
        let second = analyze_ok(QUERY);
        assert_eq!(first, second);
        let json = serde_json::to_string(&first).unwrap();
        let back: ModuleAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, first);
    }

    #[test]
    fn source_analyzer_implements_trait() {
        let analyzer: &dyn Analyzer = &SourceAnalyzer;
        let analysis = analyzer.analyze("/a.ts", "const a = 1;").unwrap();
        assert_eq!(analysis.content_hash, ContentHash::from_bytes(b"const a = 1;"));
    }
}
