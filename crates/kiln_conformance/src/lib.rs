//! Conformance test helpers for the Kiln builder.
//!
//! [`TestProject`] lays out a throwaway project on disk (`kiln.toml`, a
//! schema file and sources under `src/`) and runs builds against a cache
//! store that persists between calls, the way repeated CLI invocations do.

#![warn(missing_docs)]

use std::path::Path;

use kiln_artifact::{ArtifactElement, BuilderArtifact};
use kiln_builder::{BuildError, Builder};
use kiln_config::{load_config, resolve_schema};
use tempfile::TempDir;

/// Import line every definition file starts with.
pub const GQL_IMPORT: &str = "import { gql } from \"@/graphql-system\";\n";

/// The two-file project used throughout the docs: a fragment and a query
/// spreading it.
pub const USER_TS: &str = r#"import { gql } from "@/graphql-system";

export const userFragment = gql.fragment("User", { fields: ["id", "name"] });
"#;

/// See [`USER_TS`].
pub const QUERY_TS: &str = r#"import { gql } from "@/graphql-system";
import { userFragment } from "./user";

export const getUser = gql.operation("query", "GetUser", {
  variables: { id: "ID!" },
  fields: [gql.field("user", { id: "$id" }, [userFragment])],
});
"#;

/// A project directory that lives as long as the value.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Creates a project with the given `src/` files and extra `[builder]`
    /// settings (TOML lines).
    pub fn new(files: &[(&str, &str)], builder_settings: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let toml = format!(
            "[project]\nname = \"conformance\"\n\n[builder]\nbase_dir = \".\"\n{builder_settings}\n\n[schemas.default]\nschema = \"schema.graphql\"\n"
        );
        std::fs::write(dir.path().join("kiln.toml"), toml).expect("write kiln.toml");
        std::fs::write(
            dir.path().join("schema.graphql"),
            "type Query { user(id: ID!): User }\ntype User { id: ID! name: String email: String }\n",
        )
        .expect("write schema");
        let project = Self { dir };
        for (rel, source) in files {
            project.write(rel, source);
        }
        project
    }

    /// The project root.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes (or overwrites) `src/<rel>`.
    pub fn write(&self, rel: &str, source: &str) {
        let path = self.dir.path().join("src").join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source dir");
        }
        std::fs::write(path, source).expect("write source");
    }

    /// Deletes `src/<rel>`.
    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.dir.path().join("src").join(rel)).expect("remove source");
    }

    /// A builder for the `default` configuration.
    pub fn builder(&self) -> Builder {
        let config = load_config(self.path()).expect("load kiln.toml");
        Builder::new(resolve_schema(&config, "default", self.path()).expect("resolve schema"))
    }

    /// Builds with a fresh builder and the on-disk cache.
    pub fn build(&self) -> Result<BuilderArtifact, BuildError> {
        self.build_with(&self.builder())
    }

    /// Builds with `builder` and the on-disk cache.
    pub fn build_with(&self, builder: &Builder) -> Result<BuilderArtifact, BuildError> {
        let mut store = builder.open_store();
        builder.build(&mut store)
    }
}

/// The document text of operation `name`.
pub fn document<'a>(artifact: &'a BuilderArtifact, name: &str) -> Option<&'a str> {
    match artifact.operation(name)?.1 {
        ArtifactElement::Operation { prebuild } => Some(prebuild.document.as_str()),
        _ => None,
    }
}

/// Element IDs of an artifact, in order.
pub fn element_ids(artifact: &BuilderArtifact) -> Vec<String> {
    artifact.elements.keys().map(|id| id.as_str().to_string()).collect()
}
