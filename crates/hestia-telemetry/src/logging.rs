//! Structured logging setup.
//!
//! Installs one `tracing-subscriber` fmt layer behind an [`EnvFilter`].
//! Server events use the `hestia::server` target and access lines use
//! `hestia::access`, so the two can be tuned separately:
//!
//! ```text
//! info,hestia::access=warn
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Line format written by the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, for terminals.
    Pretty,
    /// One human readable line per event.
    Compact,
}

/// How [`init_logging`] sets up the global subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// When false, [`init_logging`] installs nothing.
    pub enabled: bool,
    /// `EnvFilter` directives, e.g. `info,hyper=warn`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Add source file and line to every event.
    pub include_location: bool,
    /// Add the event target to every event.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Pretty debug output with source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            ..Self::production()
        }
    }

    /// JSON at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
            include_target: true,
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target);

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] when `config.level` does not parse and
/// [`TelemetryError::AlreadyInstalled`] when a subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = env_filter(&config.level)?;
    tracing_subscriber::registry()
        .with(config.fmt_layer().with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))
}

/// Parses `directives` into an [`EnvFilter`]. Blank input is rejected.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] when the directives are blank or
/// malformed.
pub fn env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    let invalid = |reason: String| TelemetryError::InvalidFilter {
        filter: directives.to_string(),
        reason,
    };

    if directives.trim().is_empty() {
        return Err(invalid("no directives".to_string()));
    }
    EnvFilter::try_new(directives).map_err(|e| invalid(e.to_string()))
}
