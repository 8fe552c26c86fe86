//! Source discovery.

use std::path::Path;

use kiln_common::path::relative_to;
use kiln_common::{canonical_file_path, normalize_path};
use kiln_config::ResolvedBuildConfig;
use tracing::debug;

use crate::error::BuildError;

/// A file that takes part in the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Normalized absolute path.
    pub path: String,
    /// The file component of the file's canonical IDs.
    pub key: String,
}

/// The result of walking the project.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Included files, sorted by key.
    pub files: Vec<SourceFile>,
    /// Keys of files matched by an include and an exclude pattern.
    pub skipped: Vec<String>,
}

/// Walks the project directory and applies the include/exclude filter.
///
/// Paths are matched relative to the project root. The cache directory and
/// hidden directories are never entered.
pub fn discover(config: &ResolvedBuildConfig) -> Result<Discovered, BuildError> {
    let root = normalize_path(&config.project_dir.to_string_lossy());
    let cache_dir = normalize_path(&config.cache_dir.to_string_lossy());
    let mut paths = Vec::new();
    walk_dir(&config.project_dir, &cache_dir, &mut paths)?;

    let base_dir = config.base_dir.as_deref();
    let mut discovered = Discovered::default();
    for path in paths {
        let relative = relative_to(&path, &root);
        if !config.filter.is_included(&relative) {
            continue;
        }
        let key = canonical_file_path(&path, base_dir)?;
        if config.filter.is_excluded(&relative) {
            discovered.skipped.push(key);
        } else {
            discovered.files.push(SourceFile { path, key });
        }
    }
    discovered.files.sort_by(|a, b| a.key.cmp(&b.key));
    discovered.skipped.sort();
    debug!(
        files = discovered.files.len(),
        skipped = discovered.skipped.len(),
        "discovered sources"
    );
    Ok(discovered)
}

fn walk_dir(dir: &Path, cache_dir: &str, paths: &mut Vec<String>) -> Result<(), BuildError> {
    let read_error = |source| BuildError::Read {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let normalized = normalize_path(&path.to_string_lossy());
        if path.is_dir() {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !hidden && normalized != cache_dir {
                walk_dir(&path, cache_dir, paths)?;
            }
        } else {
            paths.push(normalized);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_config::{load_config_from_str, resolve_schema};

    fn config(dir: &Path, builder: &str) -> ResolvedBuildConfig {
        let toml = format!(
            "[project]\nname = \"app\"\n\n[builder]\n{builder}\n\n[schemas.default]\nschema = \"schema.graphql\"\n"
        );
        std::fs::write(dir.join("schema.graphql"), "type Query { id: ID }").unwrap();
        let parsed = load_config_from_str(&toml).unwrap();
        resolve_schema(&parsed, "default", dir).unwrap()
    }

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn applies_include_and_exclude() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["src/a.ts", "src/nested/b.ts", "src/a.test.ts", "README.md", ".hidden/c.ts"] {
            touch(dir.path(), rel);
        }
        let config = config(
            dir.path(),
            "include = [\"src/**/*.ts\", \".hidden/**\"]\nexclude = [\"**/*.test.ts\"]\nbase_dir = \".\"",
        );
        let discovered = discover(&config).unwrap();
        let keys: Vec<&str> = discovered.files.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["src/a.ts", "src/nested/b.ts"]);
        assert_eq!(discovered.skipped, vec!["src/a.test.ts"]);
    }

    #[test]
    fn cache_directory_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/a.ts");
        touch(dir.path(), "cache/stale.ts");
        let config = config(dir.path(), "include = \"**/*.ts\"\ncache_dir = \"cache\"\nbase_dir = \".\"");
        let discovered = discover(&config).unwrap();
        assert_eq!(discovered.files.len(), 1);
        assert_eq!(discovered.files[0].key, "src/a.ts");
    }

    #[test]
    fn keys_are_absolute_without_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "src/a.ts");
        let config = config(dir.path(), "include = \"src/**\"");
        let discovered = discover(&config).unwrap();
        assert_eq!(discovered.files[0].key, discovered.files[0].path);
    }
}
