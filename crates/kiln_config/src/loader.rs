//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// The configuration file name looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

/// Loads and validates a `kiln.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Parses and validates a `kiln.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and value ranges.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.schemas.is_empty() {
        return Err(ConfigError::MissingField("schemas".to_string()));
    }
    if config.builder.include.is_empty() {
        return Err(ConfigError::ValidationError(
            "builder.include must list at least one pattern".to_string(),
        ));
    }
    if config.builder.chunk_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "builder.chunk_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if let Some(ext) = config.builder.extensions.iter().find(|e| !e.starts_with('.')) {
        return Err(ConfigError::ValidationError(format!(
            "extension '{ext}' must start with '.'"
        )));
    }
    if config.builder.cache_dir.is_empty() {
        return Err(ConfigError::MissingField("builder.cache_dir".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkingMode;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
[project]
name = "app"

[schemas.default]
schema = "schema.graphql"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.project.name, "app");
        assert_eq!(config.builder.include, vec!["src/**"]);
        assert!(config.schemas.contains_key("default"));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "app"
description = "queries"

[builder]
include = ["src/**/*.ts"]
exclude = "**/*.test.ts"
base_dir = "."
cache_dir = "target/kiln"
partial = true
chunking = "component"
chunk_timeout_ms = 500
extensions = [".ts"]
graphql_system_aliases = ["@/graphql-system", "@app/gql"]

[builder.aliases]
"@/" = "src/"

[builder.inject]
"@/scalars" = "scalars.json"

[schemas.default]
schema = ["schema.graphql"]

[schemas.admin]
schema = "admin.graphql"
include = "admin/**"
partial = false
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.builder.exclude, vec!["**/*.test.ts"]);
        assert_eq!(config.builder.base_dir.as_deref(), Some("."));
        assert_eq!(config.builder.chunking, ChunkingMode::Component);
        assert_eq!(config.builder.chunk_timeout_ms, 500);
        assert_eq!(config.builder.aliases["@/"], "src/");
        assert_eq!(config.builder.inject["@/scalars"], "scalars.json");
        assert_eq!(config.schemas.len(), 2);
        assert_eq!(config.schemas["admin"].partial, Some(false));
    }

    #[test]
    fn missing_name_errors() {
        let toml = r#"
[project]
name = ""

[schemas.default]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "project.name"));
    }

    #[test]
    fn missing_schemas_errors() {
        let err = load_config_from_str("[project]\nname = \"app\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "schemas"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let toml = r#"
[project]
name = "app"
[builder]
chunk_timeout_ms = 0
[schemas.default]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn extension_without_dot_rejected() {
        let toml = r#"
[project]
name = "app"
[builder]
extensions = ["ts"]
[schemas.default]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(format!("{err}").contains("'ts'"));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn io_error_from_nonexistent_dir() {
        let err = load_config(Path::new("/nonexistent/dir")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
