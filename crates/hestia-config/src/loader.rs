//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! defaults, files, and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, HestiaConfig, UnclassifiedErrorPolicy};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use hestia_config::ConfigLoader;
///
/// # fn main() -> Result<(), hestia_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("hestia.toml")?
///     .with_env_prefix("HESTIA")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: HestiaConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HestiaConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is what `new()` does already; it can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = HestiaConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// ```
    /// use hestia_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = HestiaConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = HestiaConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`. Unknown fields
    /// are rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or has an unsupported extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::missing(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::unreadable(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use hestia_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     port = 9000
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.port, 9000);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat(format.to_string()))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `HESTIA__SERVER__PORT=9000` or `HESTIA__SERVER__CORS__ALLOW_ORIGINS=a,b`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load `.env` from the current directory or its parents, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::Dotenv {
                path: ".env".into(),
                reason: e.to_string(),
            }),
        }
    }

    /// Load a specific `.env` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or cannot be parsed.
    pub fn with_dotenv_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::missing(path));
        }
        dotenvy::from_path(path).map_err(|e| ConfigError::Dotenv {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(self)
    }

    /// Apply environment overrides, validate, and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable cannot be parsed or
    /// validation fails.
    pub fn load(mut self) -> Result<HestiaConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without applying env overrides or validating.
    #[must_use]
    pub fn load_unvalidated(self) -> HestiaConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<HestiaConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(&marker))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let server = &mut self.config.server;

        match parts.as_slice() {
            ["SERVER", "ADDRESS"] => server.address = value.to_string(),
            ["SERVER", "PORT"] => server.port = parse_number(key, value)?,

            ["SERVER", "LIVENESS", "PATH"] => server.liveness.path = value.to_string(),
            ["SERVER", "LIVENESS", "PASSWORD"] => server.liveness.password = optional(value),
            ["SERVER", "READINESS", "PATH"] => server.readiness.path = value.to_string(),
            ["SERVER", "READINESS", "PASSWORD"] => server.readiness.password = optional(value),
            ["SERVER", "METRICS", "PATH"] => server.metrics.path = value.to_string(),
            ["SERVER", "METRICS", "PASSWORD"] => server.metrics.password = optional(value),
            ["SERVER", "VERSION", "PATH"] => server.version.path = value.to_string(),
            ["SERVER", "VERSION", "PASSWORD"] => server.version.password = optional(value),
            ["SERVER", "VERSION", "VALUE"] => server.version.value = value.to_string(),

            ["SERVER", "TIMEOUTS", "IDLE_SECS"] => {
                server.timeouts.idle_secs = parse_number(key, value)?;
            }
            ["SERVER", "TIMEOUTS", "READ_MS"] => {
                server.timeouts.read_ms = parse_number(key, value)?;
            }
            ["SERVER", "TIMEOUTS", "READ_HEADER_MS"] => {
                server.timeouts.read_header_ms = parse_number(key, value)?;
            }
            ["SERVER", "TIMEOUTS", "WRITE_MS"] => {
                server.timeouts.write_ms = parse_number(key, value)?;
            }
            ["SERVER", "LIMITS", "HEADER_BYTES"] => {
                server.limits.header_bytes = parse_number(key, value)?;
            }

            ["SERVER", "CORS", "ALLOW_CREDENTIALS"] => {
                server.cors.allow_credentials = parse_flag(key, value)?;
            }
            ["SERVER", "CORS", "ALLOW_HEADERS"] => server.cors.allow_headers = parse_list(value),
            ["SERVER", "CORS", "ALLOW_METHODS"] => server.cors.allow_methods = parse_list(value),
            ["SERVER", "CORS", "ALLOW_ORIGINS"] => server.cors.allow_origins = parse_list(value),
            ["SERVER", "CORS", "PASSTHROUGH"] => server.cors.passthrough = parse_flag(key, value)?,
            ["SERVER", "CORS", "EXPOSE_HEADERS"] => server.cors.expose_headers = parse_list(value),
            ["SERVER", "CORS", "MAX_AGE_SECS"] => {
                server.cors.max_age_secs = parse_number(key, value)?;
            }

            ["SERVER", "DISABLE", flag] => {
                let on = parse_flag(key, value)?;
                let disable = &mut server.disable;
                match *flag {
                    "CORS" => disable.cors = on,
                    "LIVENESS" => disable.liveness = on,
                    "METRICS" => disable.metrics = on,
                    "READINESS" => disable.readiness = on,
                    "REQUEST_ID" => disable.request_id = on,
                    "REQUEST_LOGGER" => disable.request_logger = on,
                    "SIGNAL_HANDLING" => disable.signal_handling = on,
                    "VERSION" => disable.version = on,
                    _ => {}
                }
            }

            ["SERVER", "REQUEST_ID", "HEADER"] => server.request_id.header = value.to_string(),

            ["SERVER", "LIFECYCLE", "UNCLASSIFIED_ERRORS"] => {
                server.lifecycle.unclassified_errors = match value.to_lowercase().as_str() {
                    "continue" => UnclassifiedErrorPolicy::Continue,
                    "shutdown" => UnclassifiedErrorPolicy::Shutdown,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'continue' or 'shutdown'",
                        ))
                    }
                };
            }
            ["SERVER", "LIFECYCLE", "SHUTDOWN_ON_BIND_FAILURE"] => {
                server.lifecycle.shutdown_on_bind_failure = parse_flag(key, value)?;
            }
            ["SERVER", "LIFECYCLE", "DRAIN_TIMEOUT_SECS"] => {
                server.lifecycle.drain_timeout_secs = parse_number(key, value)?;
            }

            ["LOGGING", "ENABLED"] => self.config.logging.enabled = parse_flag(key, value)?,
            ["LOGGING", "LEVEL"] => self.config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => hestia_telemetry::LogFormat::Json,
                    "pretty" => hestia_telemetry::LogFormat::Pretty,
                    "compact" => hestia_telemetry::LogFormat::Compact,
                    _ => {
                        return Err(ConfigError::env(
                            key,
                            "expected 'json', 'pretty' or 'compact'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                self.config.logging.include_location = parse_flag(key, value)?;
            }

            // Unknown key - ignore
            _ => {}
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env(key, "expected boolean"))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env(key, "expected integer"))
}

/// Splits a comma separated list, dropping empty entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
