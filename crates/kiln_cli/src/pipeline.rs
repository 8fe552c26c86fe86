//! Shared helpers for CLI commands.
//!
//! Project root resolution, logging setup, schema selection and diagnostic
//! rendering used by `build`, `watch` and `clean`.

use std::path::{Path, PathBuf};

use kiln_config::{ProjectConfig, ResolvedBuildConfig, CONFIG_FILE_NAME};
use kiln_diagnostics::{Diagnostic, DiagnosticRenderer, JsonRenderer, Severity, TerminalRenderer};
use kiln_source::SourceDb;
use tracing_subscriber::EnvFilter;

use crate::{GlobalArgs, ReportFormat};

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "KILN_LOG";

/// Installs the global `tracing` subscriber.
///
/// Logs go to stderr at `warn` by default, `debug` with `--verbose` and
/// `error` with `--quiet`. `KILN_LOG` takes precedence over both flags.
pub fn init_logging(global: &GlobalArgs) {
    let default = if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when running under a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(global.color)
        .try_init();
}

/// Walks up from `start` looking for the nearest directory containing `kiln.toml`.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// `--config` may name the file (its parent is used) or the directory.
/// Otherwise the current directory and its parents are searched.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match &global.config {
        Some(config_path) => {
            let path = PathBuf::from(config_path);
            if path.is_file() {
                Ok(path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(path)
            }
        }
        None => find_project_root(&std::env::current_dir()?),
    }
}

/// The schema configurations a command operates on.
///
/// An explicit name is returned as-is and validated later by
/// `resolve_schema`; without one every configuration is selected in name
/// order.
pub fn select_schemas(config: &ProjectConfig, requested: Option<&str>) -> Vec<String> {
    match requested {
        Some(name) => vec![name.to_string()],
        None => config.schemas.keys().cloned().collect(),
    }
}

/// Where the artifact of `schema` is written.
pub fn artifact_path(project_dir: &Path, out: &str, schema: &str) -> PathBuf {
    project_dir.join(out).join(format!("{schema}.json"))
}

/// Renders diagnostics and returns how many of them are errors.
///
/// Text goes to stderr with source excerpts; JSON goes to stdout, one
/// object per line. Sources are read on demand from the paths the
/// diagnostics point at.
pub fn render_diagnostics(
    diagnostics: &[Diagnostic],
    config: Option<&ResolvedBuildConfig>,
    format: ReportFormat,
    color: bool,
) -> usize {
    match format {
        ReportFormat::Text => {
            let source_db = load_sources(diagnostics, config);
            let renderer = TerminalRenderer::new(color);
            for diag in diagnostics {
                eprint!("{}", renderer.render(diag, &source_db));
            }
        }
        ReportFormat::Json => {
            let source_db = SourceDb::new();
            for diag in diagnostics {
                println!("{}", JsonRenderer.render(diag, &source_db));
            }
        }
    }
    diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
}

fn load_sources(diagnostics: &[Diagnostic], config: Option<&ResolvedBuildConfig>) -> SourceDb {
    let mut source_db = SourceDb::new();
    let mut seen = std::collections::BTreeSet::new();
    for location in diagnostics.iter().filter_map(|d| d.location.as_ref()) {
        let key = location.file_path.as_str();
        if location.span.is_none() || !seen.insert(key) {
            continue;
        }
        let path = source_path(key, config);
        // Diagnostics still render without an excerpt when the file is gone.
        let _ = source_db.load_file(&path, key);
    }
    source_db
}

/// Maps a diagnostic file key back to a path on disk.
pub fn source_path(key: &str, config: Option<&ResolvedBuildConfig>) -> PathBuf {
    match config.and_then(|c| c.base_dir.as_deref()) {
        Some(base_dir) if !kiln_common::is_absolute(key) => Path::new(base_dir).join(key),
        _ => PathBuf::from(key),
    }
}
