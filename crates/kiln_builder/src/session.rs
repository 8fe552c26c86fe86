//! Long-lived build sessions and artifact output.

use std::io::Write;
use std::path::Path;

use kiln_artifact::BuilderArtifact;
use kiln_cache::CacheStore;
use kiln_common::{normalize_path, relative_to};
use kiln_config::{load_config, resolve_schema, CONFIG_FILE_NAME};
use tracing::debug;

use crate::build::Builder;
use crate::error::BuildError;

/// A builder paired with its cache store.
///
/// The store stays in memory between builds. Each build first re-reads
/// `kiln.toml` from the project directory and re-resolves the configuration,
/// re-hashing the schema files and injected modules. When the configuration
/// fingerprint moves the store is reopened, so a session rebuilds exactly
/// what a fresh `kiln build` would.
pub struct BuildSession {
    builder: Builder,
    store: CacheStore,
}

impl BuildSession {
    /// Opens the store for `builder`, whose configuration must come from
    /// the `kiln.toml` in its project directory.
    pub fn new(builder: Builder) -> Self {
        let store = builder.open_store();
        Self { builder, store }
    }

    /// The session's builder.
    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// The session's cache store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Re-resolves the configuration and runs a build.
    pub fn build(&mut self) -> Result<BuilderArtifact, BuildError> {
        self.refresh()?;
        self.builder.build(&mut self.store)
    }

    fn refresh(&mut self) -> Result<(), BuildError> {
        let current = self.builder.config();
        let project = load_config(&current.project_dir)?;
        let resolved = resolve_schema(&project, &current.name, &current.project_dir)?;
        let reopen = resolved.fingerprint != current.fingerprint || resolved.cache_dir != current.cache_dir;
        self.builder.reconfigure(resolved);
        if reopen {
            debug!(
                config = %self.builder.config().name,
                fingerprint = %self.builder.config().fingerprint,
                "configuration changed, reopening cache store"
            );
            self.store = self.builder.open_store();
        }
        Ok(())
    }

    /// `true` when a change to `path` can affect the next build: a source
    /// selected by the include and exclude patterns, `kiln.toml`, a schema
    /// file or an injected module. Nothing under the cache directory or a hidden
    /// directory counts.
    pub fn is_input(&self, path: &Path) -> bool {
        let config = self.builder.config();
        let path = normalize_path(&path.to_string_lossy());
        let same = |other: &Path| normalize_path(&other.to_string_lossy()) == path;
        if same(&config.project_dir.join(CONFIG_FILE_NAME))
            || config.schema_files.iter().any(|p| same(p))
            || config.inject.values().any(|p| same(p))
        {
            return true;
        }

        let root = normalize_path(&config.project_dir.to_string_lossy());
        let cache_dir = normalize_path(&config.cache_dir.to_string_lossy());
        if !path.starts_with(&format!("{root}/")) || path.starts_with(&format!("{cache_dir}/")) {
            return false;
        }
        let relative = relative_to(&path, &root);
        let mut dirs = relative.split('/');
        dirs.next_back();
        if dirs.any(|dir| dir.starts_with('.')) {
            return false;
        }
        config.filter.is_included(&relative) && !config.filter.is_excluded(&relative)
    }
}

/// Writes `artifact` as JSON to `path`, replacing any existing file
/// atomically.
pub fn write_artifact(path: &Path, artifact: &BuilderArtifact) -> Result<(), BuildError> {
    let write_error = |source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    };
    let json = artifact
        .to_json()
        .map_err(|e| write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(write_error)?;
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(json.as_bytes()).map_err(write_error)?;
    file.write_all(b"\n").map_err(write_error)?;
    file.as_file().sync_all().map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;
    debug!(path = %path.display(), bytes = json.len(), "wrote artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_artifact::ArtifactElement;
    use kiln_config::{load_config, resolve_schema};

    const TOML: &str = "[project]\nname = \"app\"\n\n[builder]\nbase_dir = \".\"\n\n[builder.inject]\n\"@/scalars\" = \"scalars.json\"\n\n[schemas.default]\nschema = \"schema.graphql\"\n";

    const NODE: &str = r#"import { gql } from "@/graphql-system";
import { idType } from "@/scalars";

export const node = gql.operation("query", "Node", {
  variables: { id: idType },
  fields: [gql.field("node", { id: "$id" }, ["id"])],
});
"#;

    fn session(dir: &Path) -> BuildSession {
        std::fs::write(dir.join("kiln.toml"), TOML).unwrap();
        std::fs::write(dir.join("schema.graphql"), "type Query { id: ID }").unwrap();
        std::fs::write(dir.join("scalars.json"), r#"{ "idType": "ID!" }"#).unwrap();
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join("src/node.ts"), NODE).unwrap();
        let config = resolve_schema(&load_config(dir).unwrap(), "default", dir).unwrap();
        BuildSession::new(Builder::new(config))
    }

    fn node_document(artifact: &BuilderArtifact) -> String {
        match artifact.operation("Node") {
            Some((_, ArtifactElement::Operation { prebuild })) => prebuild.document.clone(),
            other => panic!("expected the Node operation, got {other:?}"),
        }
    }

    #[test]
    fn inputs_cover_sources_and_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let session = session(root);
        assert!(session.is_input(&root.join("src/node.ts")));
        assert!(session.is_input(&root.join("src/added/later.ts")));
        assert!(session.is_input(&root.join("kiln.toml")));
        assert!(session.is_input(&root.join("schema.graphql")));
        assert!(session.is_input(&root.join("scalars.json")));
        assert!(!session.is_input(&root.join(".kiln-cache/default.json")));
        assert!(!session.is_input(&root.join("src/.cache/node.ts")));
        assert!(!session.is_input(&root.join("out/default.json")));
    }

    #[test]
    fn injected_module_edits_reach_the_next_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let first = session.build().unwrap();
        assert!(node_document(&first).contains("$id: ID!"));

        let again = session.build().unwrap();
        assert_eq!(again.report.stats.misses, 0);

        std::fs::write(dir.path().join("scalars.json"), r#"{ "idType": "String!" }"#).unwrap();
        let changed = session.build().unwrap();
        assert_eq!(changed.report.stats.misses, 1);
        assert!(node_document(&changed).contains("$id: String!"));
    }

    #[test]
    fn config_edits_keep_explicit_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let config = {
            session(root);
            resolve_schema(&load_config(root).unwrap(), "default", root).unwrap()
        };
        let mut session = BuildSession::new(Builder::new(config).with_partial(true));
        std::fs::write(root.join("src/bad.ts"), "import { gql } from \"@/graphql-system\";\nexport const bad = gql.fragment(\"User\", { fields: [1] });\n").unwrap();
        std::fs::write(root.join("kiln.toml"), TOML.replace("base_dir = \".\"", "base_dir = \".\"\nchunk_timeout_ms = 5000")).unwrap();

        let artifact = session.build().unwrap();
        assert!(session.builder().config().partial);
        assert_eq!(session.builder().config().chunk_timeout.as_millis(), 5000);
        assert_eq!(artifact.report.warnings.len(), 1);
    }

    #[test]
    fn writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let artifact = session.build().unwrap();
        let out = dir.path().join("out/artifact.json");
        write_artifact(&out, &artifact).unwrap();
        write_artifact(&out, &artifact).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json.get("elements").is_some());
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("out")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
