//! Errors raised while assembling a [`HestiaConfig`](crate::HestiaConfig).

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
///
/// The variants follow the loader layers: source files, `.env` files,
/// environment overrides, then validation of the merged result.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file named explicitly does not exist.
    #[error("no configuration at '{}'", path.display())]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read '{}'", path.display())]
    Unreadable {
        /// Path that was read.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file extension or format name is neither `toml` nor `json`.
    #[error("'{0}' is not a supported configuration format (expected toml or json)")]
    UnsupportedFormat(String),

    /// A `.env` file was found but dotenvy rejected it.
    #[error("cannot load dotenv file '{}': {reason}", path.display())]
    Dotenv {
        /// The `.env` file.
        path: PathBuf,
        /// Message from the dotenv parser.
        reason: String,
    },

    /// TOML source did not match the schema.
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON source did not match the schema.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be applied.
    #[error("environment override {var} rejected: {reason}")]
    Env {
        /// Full variable name, prefix included.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A single option holds a value outside its domain.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted option path such as `server.liveness.path`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Options are individually valid but contradict each other.
    #[error("conflicting options: {0}")]
    Conflict(String),
}

impl ConfigError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::Missing { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Builds an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`Conflict`](Self::Conflict) error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// True when the failure came from the contents of the configuration
    /// rather than from locating or reading it.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue { .. } | Self::Conflict(_) | Self::Env { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_names_path() {
        let err = ConfigError::missing("/etc/hestia/hestia.toml");
        assert_eq!(err.to_string(), "no configuration at '/etc/hestia/hestia.toml'");
        assert!(!err.is_invalid());
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid_value("server.liveness.path", "must start with '/'");
        assert_eq!(err.to_string(), "server.liveness.path: must start with '/'");
        assert!(err.is_invalid());
    }

    #[test]
    fn test_env_message() {
        let err = ConfigError::env("HESTIA__SERVER__PORT", "expected integer");
        assert_eq!(
            err.to_string(),
            "environment override HESTIA__SERVER__PORT rejected: expected integer"
        );
    }

    #[test]
    fn test_unsupported_format() {
        let err = ConfigError::UnsupportedFormat("yaml".into());
        assert!(err.to_string().starts_with("'yaml' is not a supported"));
        assert!(!err.is_invalid());
    }

    #[test]
    fn test_conflict() {
        let err = ConfigError::conflict("liveness and metrics share '/healthz'");
        assert!(err.is_invalid());
        assert!(err.to_string().contains("share '/healthz'"));
    }
}
