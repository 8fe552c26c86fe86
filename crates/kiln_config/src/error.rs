//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading, validating or resolving a `kiln.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A referenced schema name does not exist in the configuration.
    #[error("unknown schema '{0}'")]
    UnknownSchema(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// An include or exclude pattern is not a valid glob.
    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob {
        /// The rejected pattern.
        pattern: String,
        /// The glob compiler's explanation.
        message: String,
    },

    /// A schema file listed by a build configuration does not exist.
    #[error("schema '{schema}' references missing file {}", path.display())]
    MissingSchema {
        /// The build configuration name.
        schema: String,
        /// The missing file.
        path: PathBuf,
    },

    /// An injected module file could not be read.
    #[error("cannot read injected module '{specifier}' from {}: {source}", path.display())]
    InjectRead {
        /// The module specifier being injected.
        specifier: String,
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_schema() {
        let err = ConfigError::UnknownSchema("admin".to_string());
        assert_eq!(format!("{err}"), "unknown schema 'admin'");
    }

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("project.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: project.name");
    }

    #[test]
    fn display_missing_schema() {
        let err = ConfigError::MissingSchema {
            schema: "default".into(),
            path: PathBuf::from("/p/schema.graphql"),
        };
        assert_eq!(
            format!("{err}"),
            "schema 'default' references missing file /p/schema.graphql"
        );
    }

    #[test]
    fn display_invalid_glob() {
        let err = ConfigError::InvalidGlob {
            pattern: "src/[".into(),
            message: "unclosed character class".into(),
        };
        assert!(format!("{err}").starts_with("invalid glob 'src/['"));
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }
}
