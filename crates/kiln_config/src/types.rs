//! Configuration types deserialized from `kiln.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// The top-level project configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Settings shared by every build configuration.
    #[serde(default)]
    pub builder: BuilderConfig,
    /// Named build configurations, one per GraphQL schema.
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaConfig>,
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

/// Builder settings shared by every build configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Glob patterns (relative to the project root) selecting source files.
    #[serde(deserialize_with = "deserialize_string_or_vec")]
    pub include: Vec<String>,
    /// Glob patterns for files to skip even when included.
    #[serde(deserialize_with = "deserialize_string_or_vec")]
    pub exclude: Vec<String>,
    /// Directory that canonical IDs are made relative to. Absolute IDs when unset.
    pub base_dir: Option<String>,
    /// Directory holding cache manifests and blobs.
    pub cache_dir: String,
    /// Downgrade per-element evaluation failures to warnings.
    pub partial: bool,
    /// How cache misses are grouped into evaluation chunks.
    pub chunking: ChunkingMode,
    /// Per-chunk evaluation timeout in milliseconds.
    pub chunk_timeout_ms: u64,
    /// Extensions tried when resolving extensionless import specifiers.
    pub extensions: Vec<String>,
    /// Import specifiers that provide the `gql` builder intrinsic.
    pub graphql_system_aliases: Vec<String>,
    /// Import path aliases (`"@/" = "src/"`), relative to the project root.
    pub aliases: BTreeMap<String, String>,
    /// External modules provided to the evaluator: specifier to JSON file.
    pub inject: BTreeMap<String, String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            include: vec!["src/**".to_string()],
            exclude: Vec::new(),
            base_dir: None,
            cache_dir: ".kiln-cache".to_string(),
            partial: false,
            chunking: ChunkingMode::default(),
            chunk_timeout_ms: 30_000,
            extensions: [".ts", ".tsx", ".js", ".mjs"].iter().map(|s| s.to_string()).collect(),
            graphql_system_aliases: vec!["@/graphql-system".to_string()],
            aliases: BTreeMap::new(),
            inject: BTreeMap::new(),
        }
    }
}

/// Chunk granularity for evaluation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMode {
    /// One chunk per miss file (default).
    #[default]
    File,
    /// One chunk per connected component of miss files.
    Component,
}

/// A named build configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    /// Schema files for this configuration, relative to the project root.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub schema: Vec<String>,
    /// Overrides `[builder].include` for this configuration.
    #[serde(default, deserialize_with = "deserialize_opt_string_or_vec")]
    pub include: Option<Vec<String>>,
    /// Overrides `[builder].exclude` for this configuration.
    #[serde(default, deserialize_with = "deserialize_opt_string_or_vec")]
    pub exclude: Option<Vec<String>>,
    /// Overrides `[builder].partial` for this configuration.
    #[serde(default)]
    pub partial: Option<bool>,
}

struct StringOrVec;

impl<'de> Visitor<'de> for StringOrVec {
    type Value = Vec<String>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a string or a list of strings")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(vec![v.to_string()])
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut vec = Vec::new();
        while let Some(val) = seq.next_element::<String>()? {
            vec.push(val);
        }
        Ok(vec)
    }
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows both `include = "src/**"` and `include = ["src/**", "lib/**"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringOrVec)
}

fn deserialize_opt_string_or_vec<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(StringOrVec).map(Some)
}
