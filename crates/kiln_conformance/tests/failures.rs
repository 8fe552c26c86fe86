//! Build failures: graph errors, duplicate names, element failures,
//! timeouts and cancellation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiln_builder::{BuildError, CancellationToken, ChunkStrategy};
use kiln_conformance::{document, element_ids, TestProject, GQL_IMPORT, QUERY_TS, USER_TS};
use kiln_diagnostics::{DiagnosticCode, Severity};
use kiln_eval::{ChunkOutput, ChunkProgram, Evaluator, InjectedModules, LoadError, Sandbox};
use kiln_graph::GraphError;

#[test]
fn cycles_report_the_chain() {
    let a = format!(
        "{GQL_IMPORT}import {{ y }} from \"./b\";\nexport const x = gql.fragment(\"User\", {{ fields: [y] }});\n"
    );
    let b = format!(
        "{GQL_IMPORT}import {{ x }} from \"./a\";\nexport const y = gql.fragment(\"User\", {{ fields: [x] }});\n"
    );
    let project = TestProject::new(&[("a.ts", &a), ("b.ts", &b)], "");
    let err = project.build().unwrap_err();
    assert_eq!(err.code(), DiagnosticCode::GraphCircularDependency);
    let BuildError::Graph(GraphError::CircularDependency { chain }) = &err else {
        panic!("expected a cycle, got {err}");
    };
    let ids: Vec<&str> = chain.iter().map(|id| id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids.first(), ids.last());
    assert!(ids.contains(&"src/a.ts::x"));
    assert!(ids.contains(&"src/b.ts::y"));
    assert_eq!(err.related_files(), vec!["src/a.ts", "src/b.ts"]);
}

#[test]
fn duplicate_operation_names_fail_the_build() {
    let other = QUERY_TS.replace("getUser", "fetchUser");
    let project = TestProject::new(
        &[("user.ts", USER_TS), ("query.ts", QUERY_TS), ("other.ts", &other)],
        "partial = true",
    );
    let err = project.build().unwrap_err();
    assert_eq!(err.code(), DiagnosticCode::DocDuplicate);
    let BuildError::DuplicateOperation { name, sources } = &err else {
        panic!("expected a duplicate operation, got {err}");
    };
    assert_eq!(name, "GetUser");
    let ids: Vec<&str> = sources.iter().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["src/other.ts::fetchUser", "src/query.ts::getUser"]);

    // Nothing was cached for the failed build.
    project.remove("other.ts");
    let artifact = project.build().unwrap();
    assert_eq!(artifact.report.stats.misses, 2);
}

#[test]
fn missing_imports_point_at_the_importer() {
    let query = QUERY_TS.replace("{ userFragment } from \"./user\"", "{ userFragment } from \"./nowhere\"");
    let project = TestProject::new(&[("user.ts", USER_TS), ("query.ts", &query)], "");
    let err = project.build().unwrap_err();
    assert_eq!(err.code(), DiagnosticCode::GraphMissingImport);
    let diag = err.to_diagnostic();
    assert_eq!(diag.location.unwrap().file_path, "src/query.ts");
}

#[test]
fn unrepresentable_numbers_stop_at_analysis() {
    let query = format!(
        "{GQL_IMPORT}export const users = gql.operation(\"query\", \"Users\", {{ fields: [gql.field(\"users\", {{ limit: 1e999 }}, [\"id\"])] }});\n"
    );
    let project = TestProject::new(&[("users.ts", &query)], "partial = true");
    let err = project.build().unwrap_err();
    assert_eq!(err.code(), DiagnosticCode::AnalysisParseError);
    assert_eq!(err.related_files(), vec!["src/users.ts"]);

    project.write("users.ts", &query.replace("1e999", "10"));
    let first = project.build().unwrap();
    assert!(document(&first, "Users").unwrap().contains("users(limit: 10)"));
    let second = project.build().unwrap();
    assert_eq!(second.report.stats.misses, 0);
    assert_eq!(second.elements, first.elements);
}

fn broken_project(settings: &str) -> TestProject {
    let bad = format!("{GQL_IMPORT}export const bad = gql.fragment(\"User\", {{ fields: [7] }});\n");
    let dependent = format!(
        "{GQL_IMPORT}import {{ bad }} from \"./bad\";\nexport const usesBad = gql.fragment(\"User\", {{ fields: [bad] }});\n"
    );
    TestProject::new(
        &[("user.ts", USER_TS), ("bad.ts", &bad), ("dependent.ts", &dependent)],
        settings,
    )
}

#[test]
fn strict_builds_fail_on_element_errors() {
    let project = broken_project("");
    let Err(BuildError::Evaluation { diagnostics }) = project.build() else {
        panic!("expected an evaluation error");
    };
    let files: Vec<&str> = diagnostics
        .iter()
        .map(|d| d.location.as_ref().unwrap().file_path.as_str())
        .collect();
    assert_eq!(files, vec!["src/bad.ts", "src/dependent.ts"]);
    assert!(diagnostics.iter().all(|d| d.code == DiagnosticCode::ElementEvaluationFailed));
    assert!(diagnostics[1].message.contains("src/bad.ts::bad"));
}

#[test]
fn partial_builds_keep_healthy_elements() {
    let project = broken_project("partial = true");
    let artifact = project.build().unwrap();
    assert_eq!(element_ids(&artifact), vec!["src/user.ts::userFragment"]);
    assert_eq!(artifact.report.warnings.len(), 2);
    assert!(artifact.report.warnings.iter().all(|d| d.severity == Severity::Warning));

    // Fixing the leaf re-evaluates its dependent too.
    project.write(
        "bad.ts",
        &format!("{GQL_IMPORT}export const bad = gql.fragment(\"User\", {{ fields: [\"email\"] }});\n"),
    );
    let artifact = project.build().unwrap();
    assert_eq!(artifact.report.stats.misses, 2);
    assert!(artifact.report.warnings.is_empty());
    assert_eq!(artifact.elements.len(), 3);
}

#[test]
fn failures_inside_a_chunk_stay_local() {
    let source = format!(
        "{GQL_IMPORT}export const good = gql.fragment(\"User\", {{ fields: [\"id\"] }});\nexport const broken = gql.fragment(\"User\", {{ fields: [true] }});\n"
    );
    let project = TestProject::new(&[("mixed.ts", &source)], "partial = true");
    let artifact = project.build().unwrap();
    assert_eq!(element_ids(&artifact), vec!["src/mixed.ts::good"]);
    assert_eq!(artifact.report.warnings.len(), 1);
    let warning = &artifact.report.warnings[0];
    assert_eq!(warning.code, DiagnosticCode::ElementEvaluationFailed);
    let location = warning.location.as_ref().unwrap();
    assert_eq!(location.file_path, "src/mixed.ts");
    assert_eq!(location.ast_path.as_deref(), Some("broken"));
}

#[test]
fn function_parameters_fail_only_their_element() {
    let source = format!(
        "{GQL_IMPORT}export function build(limit) {{\n  const base = gql.fragment(\"User\", {{ fields: [\"id\"] }});\n  const byId = gql.operation(\"query\", \"ById\", {{ fields: [gql.field(\"user\", {{ first: limit }}, [base])] }});\n  return byId;\n}}\n"
    );
    let project = TestProject::new(&[("build.ts", &source)], "partial = true");
    let artifact = project.build().unwrap();
    assert_eq!(element_ids(&artifact), vec!["src/build.ts::build.base"]);
    assert_eq!(artifact.report.warnings.len(), 1);
    let warning = &artifact.report.warnings[0];
    assert_eq!(warning.code, DiagnosticCode::ElementEvaluationFailed);
    assert_eq!(warning.location.as_ref().unwrap().ast_path.as_deref(), Some("build.byId"));
    assert!(warning.message.contains("`limit` is not defined"));
}

struct Slow {
    delay: Duration,
}

impl Evaluator for Slow {
    fn execute(&self, program: &ChunkProgram, injected: &InjectedModules) -> Result<ChunkOutput, LoadError> {
        if program.files.iter().any(|f| f.ends_with("slow.ts")) {
            std::thread::sleep(self.delay);
        }
        Sandbox::new().execute(program, injected)
    }
}

#[test]
fn timeouts_fail_only_their_chunk() {
    let slow = format!("{GQL_IMPORT}export const slow = gql.fragment(\"User\", {{ fields: [\"id\"] }});\n");
    let project = TestProject::new(
        &[("user.ts", USER_TS), ("slow.ts", &slow)],
        "partial = true\nchunk_timeout_ms = 50",
    );
    let builder = project.builder().with_evaluator(Slow {
        delay: Duration::from_secs(2),
    });
    let artifact = project.build_with(&builder).unwrap();
    assert_eq!(element_ids(&artifact), vec!["src/user.ts::userFragment"]);
    assert_eq!(artifact.report.warnings.len(), 1);
    assert_eq!(artifact.report.warnings[0].code, DiagnosticCode::RuntimeModuleLoadFailed);

    // The timed-out file is not cached; a healthy evaluator picks it up.
    let artifact = project.build().unwrap();
    assert_eq!(artifact.report.stats.misses, 1);
    assert_eq!(artifact.elements.len(), 2);
}

#[test]
fn cancelled_builds_do_not_touch_the_cache() {
    let project = TestProject::new(&[("user.ts", USER_TS), ("query.ts", QUERY_TS)], "");
    let token = CancellationToken::new();
    token.cancel();
    let builder = project
        .builder()
        .with_strategy(ChunkStrategy::PerComponent)
        .with_cancellation(token.clone());
    assert!(matches!(project.build_with(&builder), Err(BuildError::Cancelled)));

    token.reset();
    let artifact = project.build_with(&builder).unwrap();
    assert_eq!(artifact.report.stats.misses, 2);
}

/// Cancels the build while evaluating `user.ts` and records every file it
/// was asked to evaluate.
struct CancelDuringUser {
    token: CancellationToken,
    evaluated: Arc<Mutex<Vec<String>>>,
}

impl Evaluator for CancelDuringUser {
    fn execute(&self, program: &ChunkProgram, injected: &InjectedModules) -> Result<ChunkOutput, LoadError> {
        let mut evaluated = self.evaluated.lock().unwrap();
        for file in &program.files {
            evaluated.push(file.to_string());
        }
        drop(evaluated);
        if program.files.iter().any(|f| f.ends_with("user.ts")) {
            self.token.cancel();
        }
        Sandbox::new().execute(program, injected)
    }
}

fn cache_snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.insert(path.clone(), std::fs::read(&path).unwrap());
            }
        }
    }
    files
}

#[test]
fn cancelling_mid_build_skips_later_waves() {
    let project = TestProject::new(&[("user.ts", USER_TS), ("query.ts", QUERY_TS)], "");
    project.build().unwrap();
    let cache_dir = project.path().join(".kiln-cache");
    let before = cache_snapshot(&cache_dir);

    project.write("user.ts", &USER_TS.replace("\"name\"", "\"email\""));
    let token = CancellationToken::new();
    let evaluated = Arc::new(Mutex::new(Vec::new()));
    let builder = project
        .builder()
        .with_strategy(ChunkStrategy::PerFile)
        .with_cancellation(token.clone())
        .with_evaluator(CancelDuringUser {
            token: token.clone(),
            evaluated: Arc::clone(&evaluated),
        });
    assert!(matches!(project.build_with(&builder), Err(BuildError::Cancelled)));

    let evaluated = evaluated.lock().unwrap().clone();
    assert_eq!(evaluated.len(), 1);
    assert!(evaluated[0].ends_with("user.ts"));
    assert_eq!(cache_snapshot(&cache_dir), before);

    let artifact = project.build().unwrap();
    assert_eq!(artifact.report.stats.misses, 2);
    assert!(document(&artifact, "GetUser").unwrap().contains("email"));
}
