//! Main configuration types.
//!
//! This module provides the top-level [`HestiaConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ConfigError, LoggingConfig, ServerOptions};

/// Complete Hestia configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use hestia_config::HestiaConfig;
///
/// let config = HestiaConfig::default();
/// assert_eq!(config.server.port, 8000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HestiaConfig {
    /// Server options.
    #[serde(default)]
    pub server: ServerOptions,

    /// Logging options.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HestiaConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> HestiaConfigBuilder {
        HestiaConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the server options are invalid or the log
    /// level is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "logging.level",
                "must not be empty",
            ));
        }

        Ok(())
    }

    /// Development preset: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = hestia_telemetry::LogFormat::Pretty;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON info logs.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = hestia_telemetry::LogFormat::Json;
        config
    }
}

impl ServerOptions {
    /// Validate the server options.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - A route path does not start with `/`
    /// - Two enabled routes share a path
    /// - The header size limit is zero
    /// - The request identifier header is not a valid header name
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (name, path) in self.enabled_routes() {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid_value(
                    format!("server.{name}.path"),
                    format!("must start with '/', got '{path}'"),
                ));
            }
            if let Some(other) = seen.insert(path, name) {
                return Err(ConfigError::conflict(format!(
                    "routes '{other}' and '{name}' share the path '{path}'"
                )));
            }
        }

        if self.limits.header_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.limits.header_bytes",
                "must be greater than zero",
            ));
        }

        let header = &self.request_id.header;
        if header.is_empty()
            || !header
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::invalid_value(
                "server.request_id.header",
                format!("'{header}' is not a valid header name"),
            ));
        }

        Ok(())
    }
}

/// Builder for [`HestiaConfig`].
#[derive(Debug, Default)]
pub struct HestiaConfigBuilder {
    server: Option<ServerOptions>,
    logging: Option<LoggingConfig>,
}

impl HestiaConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server options.
    #[must_use]
    pub fn server(mut self, server: ServerOptions) -> Self {
        self.server = Some(server);
        self
    }

    /// Set the logging options.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration. Unset sections use their defaults.
    #[must_use]
    pub fn build(self) -> HestiaConfig {
        HestiaConfig {
            server: self.server.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }
}
