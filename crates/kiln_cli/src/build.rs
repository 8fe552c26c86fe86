//! `kiln build`: one-shot builds.
//!
//! 1. Find the project root (walk up looking for `kiln.toml`)
//! 2. Load the configuration and select schema configurations
//! 3. Build each configuration against its cache store
//! 4. Write `<out>/<schema>.json` and render diagnostics

use std::path::Path;

use kiln_artifact::BuilderArtifact;
use kiln_builder::{write_artifact, BuildError, Builder};
use kiln_config::{load_config, resolve_schema, ResolvedBuildConfig};
use tracing::info;

use crate::pipeline::{artifact_path, render_diagnostics, resolve_project_root, select_schemas};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln build` command.
///
/// Returns exit code 0 when every configuration built, 1 otherwise.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = match load_config(&project_dir) {
        Ok(config) => config,
        Err(err) => {
            let err = BuildError::from(err);
            render_diagnostics(&err.to_diagnostics(), None, args.format, global.color);
            return Ok(1);
        }
    };

    let mut failed = false;
    for schema in select_schemas(&config, args.schema.as_deref()) {
        let resolved = match resolve_schema(&config, &schema, &project_dir) {
            Ok(resolved) => resolved,
            Err(err) => {
                let err = BuildError::from(err);
                render_diagnostics(&err.to_diagnostics(), None, args.format, global.color);
                failed = true;
                continue;
            }
        };
        if !global.quiet && args.format == ReportFormat::Text {
            eprintln!("   Building {} [{schema}]", config.project.name);
        }

        let partial = args.partial || resolved.partial;
        let builder = Builder::new(resolved).with_partial(partial);
        let mut store = builder.open_store();
        let result = builder.build(&mut store);
        let out = artifact_path(&project_dir, &args.out, &schema);
        if !report(result, &out, builder.config(), args.format, global) {
            failed = true;
        }
    }

    Ok(i32::from(failed))
}

/// Writes the artifact and renders the outcome. Returns `false` on failure.
pub fn report(
    result: Result<BuilderArtifact, BuildError>,
    out: &Path,
    config: &ResolvedBuildConfig,
    format: ReportFormat,
    global: &GlobalArgs,
) -> bool {
    let artifact = match result.and_then(|artifact| write_artifact(out, &artifact).map(|()| artifact)) {
        Ok(artifact) => artifact,
        Err(err) => {
            render_diagnostics(&err.to_diagnostics(), Some(config), format, global.color);
            if !global.quiet && format == ReportFormat::Text {
                eprintln!("   Failed {}: {err}", config.name);
            }
            return false;
        }
    };

    render_diagnostics(&artifact.report.warnings, Some(config), format, global.color);
    let stats = &artifact.report.stats;
    info!(path = %out.display(), "artifact written");
    if !global.quiet && format == ReportFormat::Text {
        eprintln!(
            "   Finished {}: {} element(s), {} hit(s), {} miss(es), {} skipped, {} warning(s) in {}ms",
            config.name,
            artifact.elements.len(),
            stats.hits,
            stats.misses,
            stats.skips,
            artifact.report.warnings.len(),
            artifact.report.duration_ms
        );
    }
    true
}
