//! Build configuration resolution: merging `[builder]` with a `[schemas.<name>]` table.

use crate::error::ConfigError;
use crate::filter::FileFilter;
use crate::types::{ChunkingMode, ProjectConfig};
use kiln_common::path::{join, normalize_path};
use kiln_common::ContentHash;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A fully resolved build configuration.
///
/// Directories are absolute and normalized. Per-schema `include`, `exclude`
/// and `partial` replace the shared builder values when present.
#[derive(Debug, Clone)]
pub struct ResolvedBuildConfig {
    /// The build configuration (schema) name.
    pub name: String,
    /// The project root.
    pub project_dir: PathBuf,
    /// Compiled include/exclude patterns.
    pub filter: FileFilter,
    /// Canonical IDs are relative to this directory when set.
    pub base_dir: Option<String>,
    /// Absolute cache directory.
    pub cache_dir: PathBuf,
    /// Downgrade evaluation failures to warnings.
    pub partial: bool,
    /// Chunk granularity.
    pub chunking: ChunkingMode,
    /// Per-chunk evaluation timeout.
    pub chunk_timeout: Duration,
    /// Extensions tried during module resolution.
    pub extensions: Vec<String>,
    /// Specifiers that provide the builder intrinsic.
    pub graphql_system_aliases: Vec<String>,
    /// Alias prefix to absolute target directory, longest prefix first.
    pub aliases: Vec<(String, String)>,
    /// Injected module specifier to absolute JSON file path.
    pub inject: BTreeMap<String, PathBuf>,
    /// Absolute schema file paths.
    pub schema_files: Vec<PathBuf>,
    /// Hash of every setting and input file that influences element values.
    pub fingerprint: ContentHash,
}

/// Resolves the named build configuration against `project_dir`.
///
/// Fails when the schema name is unknown, a glob does not compile, a schema
/// file is missing, or an injected module cannot be read.
pub fn resolve_schema(
    config: &ProjectConfig,
    schema_name: &str,
    project_dir: &Path,
) -> Result<ResolvedBuildConfig, ConfigError> {
    let schema = config
        .schemas
        .get(schema_name)
        .ok_or_else(|| ConfigError::UnknownSchema(schema_name.to_string()))?;
    let builder = &config.builder;
    let root = normalize_path(&project_dir.to_string_lossy());

    let include = schema.include.as_ref().unwrap_or(&builder.include);
    let exclude = schema.exclude.as_ref().unwrap_or(&builder.exclude);
    let filter = FileFilter::new(include, exclude)?;

    let mut material = String::new();

    let base_dir = builder.base_dir.as_deref().map(|b| join(&root, b));
    material.push_str(&format!("base_dir={base_dir:?}\n"));

    let mut aliases: Vec<(String, String)> = builder
        .aliases
        .iter()
        .map(|(prefix, target)| (prefix.clone(), join(&root, target)))
        .collect();
    aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    for (prefix, target) in &aliases {
        material.push_str(&format!("alias {prefix}={target}\n"));
    }
    for ext in &builder.extensions {
        material.push_str(&format!("ext {ext}\n"));
    }
    for alias in &builder.graphql_system_aliases {
        material.push_str(&format!("system {alias}\n"));
    }

    let mut inject = BTreeMap::new();
    for (specifier, file) in &builder.inject {
        let path = PathBuf::from(join(&root, file));
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::InjectRead {
            specifier: specifier.clone(),
            path: path.clone(),
            source,
        })?;
        material.push_str(&format!("inject {specifier}={}\n", ContentHash::from_bytes(&bytes)));
        inject.insert(specifier.clone(), path);
    }

    let mut schema_files = Vec::new();
    for file in &schema.schema {
        let path = PathBuf::from(join(&root, file));
        let bytes = std::fs::read(&path).map_err(|_| ConfigError::MissingSchema {
            schema: schema_name.to_string(),
            path: path.clone(),
        })?;
        material.push_str(&format!("schema {file}={}\n", ContentHash::from_bytes(&bytes)));
        schema_files.push(path);
    }

    Ok(ResolvedBuildConfig {
        name: schema_name.to_string(),
        project_dir: PathBuf::from(&root),
        filter,
        base_dir,
        cache_dir: PathBuf::from(join(&root, &builder.cache_dir)),
        partial: schema.partial.unwrap_or(builder.partial),
        chunking: builder.chunking,
        chunk_timeout: Duration::from_millis(builder.chunk_timeout_ms),
        extensions: builder.extensions.clone(),
        graphql_system_aliases: builder.graphql_system_aliases.clone(),
        aliases,
        inject,
        schema_files,
        fingerprint: ContentHash::from_bytes(material.as_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;

    const CONFIG: &str = r#"
[project]
name = "app"

[builder]
include = "src/**"
base_dir = "."
partial = true

[builder.aliases]
"@/" = "src/"
"@/components/" = "src/ui/components/"

[schemas.default]
schema = "schema.graphql"

[schemas.admin]
schema = "admin.graphql"
include = "admin/**"
partial = false
"#;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("schema.graphql"), "type Query { a: Int }").unwrap();
        std::fs::write(dir.path().join("admin.graphql"), "type Query { b: Int }").unwrap();
        dir
    }

    #[test]
    fn resolves_default_schema() {
        let dir = project();
        let config = load_config_from_str(CONFIG).unwrap();
        let resolved = resolve_schema(&config, "default", dir.path()).unwrap();
        let root = normalize_path(&dir.path().to_string_lossy());
        assert_eq!(resolved.name, "default");
        assert_eq!(resolved.base_dir.as_deref(), Some(root.as_str()));
        assert!(resolved.partial);
        assert!(resolved.filter.is_included("src/user.ts"));
        assert!(!resolved.filter.is_included("admin/user.ts"));
        assert_eq!(resolved.schema_files.len(), 1);
        assert_eq!(resolved.cache_dir, PathBuf::from(format!("{root}/.kiln-cache")));
    }

    #[test]
    fn schema_overrides_builder_settings() {
        let dir = project();
        let config = load_config_from_str(CONFIG).unwrap();
        let resolved = resolve_schema(&config, "admin", dir.path()).unwrap();
        assert!(!resolved.partial);
        assert!(resolved.filter.is_included("admin/user.ts"));
        assert!(!resolved.filter.is_included("src/user.ts"));
    }

    #[test]
    fn aliases_sorted_longest_first() {
        let dir = project();
        let config = load_config_from_str(CONFIG).unwrap();
        let resolved = resolve_schema(&config, "default", dir.path()).unwrap();
        assert_eq!(resolved.aliases[0].0, "@/components/");
        assert!(resolved.aliases[0].1.ends_with("/src/ui/components"));
        assert_eq!(resolved.aliases[1].0, "@/");
    }

    #[test]
    fn unknown_schema_errors() {
        let dir = project();
        let config = load_config_from_str(CONFIG).unwrap();
        let err = resolve_schema(&config, "nope", dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema(name) if name == "nope"));
    }

    #[test]
    fn missing_schema_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_str(CONFIG).unwrap();
        let err = resolve_schema(&config, "default", dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSchema { .. }));
    }

    #[test]
    fn fingerprint_tracks_schema_content() {
        let dir = project();
        let config = load_config_from_str(CONFIG).unwrap();
        let before = resolve_schema(&config, "default", dir.path()).unwrap().fingerprint;
        let again = resolve_schema(&config, "default", dir.path()).unwrap().fingerprint;
        assert_eq!(before, again);

        std::fs::write(dir.path().join("schema.graphql"), "type Query { c: Int }").unwrap();
        let after = resolve_schema(&config, "default", dir.path()).unwrap().fingerprint;
        assert_ne!(before, after);
    }

    #[test]
    fn unreadable_inject_file_errors() {
        let dir = project();
        let toml = format!("{CONFIG}\n[builder.inject]\n\"@/scalars\" = \"missing.json\"\n");
        let config = load_config_from_str(&toml).unwrap();
        let err = resolve_schema(&config, "default", dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InjectRead { specifier, .. } if specifier == "@/scalars"));
    }
}
