//! `kiln clean`: cache maintenance.

use std::collections::BTreeSet;
use std::path::PathBuf;

use kiln_builder::BuildError;
use kiln_cache::collect_garbage;
use kiln_config::{load_config, resolve_schema};

use crate::pipeline::{render_diagnostics, resolve_project_root};
use crate::{CleanArgs, GlobalArgs, ReportFormat};

/// Runs the `kiln clean` command.
///
/// Every cache directory used by a configuration is either garbage
/// collected or, with `--all`, removed.
pub fn run(args: &CleanArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_root(global)?;
    let config = match load_config(&project_dir) {
        Ok(config) => config,
        Err(err) => {
            render_diagnostics(&BuildError::from(err).to_diagnostics(), None, ReportFormat::Text, global.color);
            return Ok(1);
        }
    };

    // Configurations may share a cache directory.
    let mut cache_dirs: BTreeSet<PathBuf> = BTreeSet::new();
    for name in config.schemas.keys() {
        match resolve_schema(&config, name, &project_dir) {
            Ok(resolved) => {
                cache_dirs.insert(resolved.cache_dir);
            }
            Err(err) => {
                render_diagnostics(&BuildError::from(err).to_diagnostics(), None, ReportFormat::Text, global.color);
                return Ok(1);
            }
        }
    }

    for dir in &cache_dirs {
        if args.all {
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
            if !global.quiet {
                eprintln!("   Removed {}", dir.display());
            }
        } else {
            let stats = collect_garbage(dir)?;
            if !global.quiet {
                eprintln!(
                    "   Cleaned {}: {} artifact blob(s), {} analysis blob(s) removed ({} manifest(s) kept)",
                    dir.display(),
                    stats.removed_artifacts,
                    stats.removed_analyses,
                    stats.manifests
                );
            }
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("kiln.toml"),
            "[project]\nname = \"app\"\n\n[schemas.default]\nschema = \"schema.graphql\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("schema.graphql"), "type Query { id: ID }").unwrap();
        dir
    }

    fn global(dir: &tempfile::TempDir) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(dir.path().display().to_string()),
        }
    }

    #[test]
    fn clean_all_removes_the_cache_directory() {
        let dir = project();
        let cache = dir.path().join(".kiln-cache/artifacts");
        std::fs::create_dir_all(&cache).unwrap();
        assert_eq!(run(&CleanArgs { all: true }, &global(&dir)).unwrap(), 0);
        assert!(!dir.path().join(".kiln-cache").exists());
    }

    #[test]
    fn gc_tolerates_a_missing_cache() {
        let dir = project();
        assert_eq!(run(&CleanArgs { all: false }, &global(&dir)).unwrap(), 0);
    }
}
