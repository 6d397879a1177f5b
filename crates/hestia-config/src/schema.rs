//! Configuration schema types.
//!
//! This module defines the structure of every configuration section. All
//! sections reject unknown fields and fill missing ones with defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable options of a Hestia server.
///
/// Handlers, middlewares and loggers cannot be expressed in a file; they are
/// attached at runtime through the server's configuration builder.
///
/// # Example
///
/// ```
/// use hestia_config::ServerOptions;
///
/// let options = ServerOptions::default();
/// assert_eq!(options.bind_address(), "0.0.0.0:8000");
/// assert_eq!(options.liveness.path, "/healthz");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerOptions {
    /// Interface to bind.
    #[serde(default = "default_address")]
    pub address: String,

    /// Port to bind. `0` asks the OS for a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Liveness probe route.
    #[serde(default = "default_liveness")]
    pub liveness: PathConfig,

    /// Readiness probe route.
    #[serde(default = "default_readiness")]
    pub readiness: PathConfig,

    /// Metrics route.
    #[serde(default = "default_metrics")]
    pub metrics: PathConfig,

    /// Version route and the value it reports.
    #[serde(default)]
    pub version: VersionConfig,

    /// Connection timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Size limits.
    #[serde(default)]
    pub limits: LimitConfig,

    /// Cross-origin negotiation.
    #[serde(default)]
    pub cors: CorsOptions,

    /// Feature switches.
    #[serde(default)]
    pub disable: DisableConfig,

    /// Request identifier settings.
    #[serde(default)]
    pub request_id: RequestIdentifierConfig,

    /// Lifecycle policies.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            liveness: default_liveness(),
            readiness: default_readiness(),
            metrics: default_metrics(),
            version: VersionConfig::default(),
            timeouts: TimeoutConfig::default(),
            limits: LimitConfig::default(),
            cors: CorsOptions::default(),
            disable: DisableConfig::default(),
            request_id: RequestIdentifierConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ServerOptions {
    /// Returns `address:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }

    /// Returns `(name, path)` for every route that is enabled.
    #[must_use]
    pub fn enabled_routes(&self) -> Vec<(&'static str, &str)> {
        let mut routes = Vec::with_capacity(4);
        if !self.disable.liveness {
            routes.push(("liveness", self.liveness.path.as_str()));
        }
        if !self.disable.readiness {
            routes.push(("readiness", self.readiness.path.as_str()));
        }
        if !self.disable.metrics {
            routes.push(("metrics", self.metrics.path.as_str()));
        }
        if !self.disable.version {
            routes.push(("version", self.version.path.as_str()));
        }
        routes
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_liveness() -> PathConfig {
    PathConfig::new("/healthz")
}

fn default_readiness() -> PathConfig {
    PathConfig::new("/readyz")
}

fn default_metrics() -> PathConfig {
    PathConfig::new("/metrics")
}

/// A route path with an optional access password.
///
/// The password is reserved: it is carried through configuration but no
/// built-in route checks it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    /// Route path, starting with `/`.
    pub path: String,

    /// Reserved access password.
    #[serde(default)]
    pub password: Option<String>,
}

impl PathConfig {
    /// Creates a path without a password.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: None,
        }
    }
}

/// Version route configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    /// Route path.
    #[serde(default = "default_version_path")]
    pub path: String,

    /// Reserved access password.
    #[serde(default)]
    pub password: Option<String>,

    /// Version string served as plain text.
    #[serde(default = "default_version_value")]
    pub value: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            path: default_version_path(),
            password: None,
            value: default_version_value(),
        }
    }
}

fn default_version_path() -> String {
    "/version".to_string()
}

fn default_version_value() -> String {
    "development".to_string()
}

/// Connection timeouts.
///
/// Zero disables the corresponding timeout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Keep-alive idle timeout in seconds.
    #[serde(default = "default_idle_secs")]
    pub idle_secs: u64,

    /// Budget for reading a request body, in milliseconds.
    #[serde(default = "default_read_ms")]
    pub read_ms: u64,

    /// Budget for reading request headers, in milliseconds.
    #[serde(default = "default_read_header_ms")]
    pub read_header_ms: u64,

    /// Budget for producing a response, in milliseconds.
    #[serde(default = "default_write_ms")]
    pub write_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: default_idle_secs(),
            read_ms: default_read_ms(),
            read_header_ms: default_read_header_ms(),
            write_ms: default_write_ms(),
        }
    }
}

impl TimeoutConfig {
    /// Idle timeout.
    #[must_use]
    pub const fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    /// Body read timeout.
    #[must_use]
    pub const fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    /// Header read timeout.
    #[must_use]
    pub const fn read_header(&self) -> Duration {
        Duration::from_millis(self.read_header_ms)
    }

    /// Write timeout.
    #[must_use]
    pub const fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

const fn default_idle_secs() -> u64 {
    30
}

const fn default_read_ms() -> u64 {
    3_000
}

const fn default_read_header_ms() -> u64 {
    3_000
}

const fn default_write_ms() -> u64 {
    10_000
}

/// Size limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LimitConfig {
    /// Maximum size of the request head in bytes.
    #[serde(default = "default_header_bytes")]
    pub header_bytes: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            header_bytes: default_header_bytes(),
        }
    }
}

const fn default_header_bytes() -> usize {
    100 * 1024
}

/// Cross-origin negotiation options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsOptions {
    /// Emit `Access-Control-Allow-Credentials: true`.
    #[serde(default)]
    pub allow_credentials: bool,

    /// Request headers a client may send.
    #[serde(default)]
    pub allow_headers: Vec<String>,

    /// Methods a client may use.
    #[serde(default = "default_cors_methods")]
    pub allow_methods: Vec<String>,

    /// Origins echoed back in `Access-Control-Allow-Origin`.
    #[serde(default = "default_cors_origins")]
    pub allow_origins: Vec<String>,

    /// Let a successful preflight reach the wrapped handler.
    #[serde(default)]
    pub passthrough: bool,

    /// Response headers readable by client scripts.
    #[serde(default)]
    pub expose_headers: Vec<String>,

    /// How long a preflight result may be cached, in seconds.
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allow_credentials: false,
            allow_headers: Vec::new(),
            allow_methods: default_cors_methods(),
            allow_origins: default_cors_origins(),
            passthrough: false,
            expose_headers: Vec::new(),
            max_age_secs: default_cors_max_age(),
        }
    }
}

impl CorsOptions {
    /// Preflight cache duration.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

fn default_cors_methods() -> Vec<String> {
    vec!["GET".to_string(), "OPTIONS".to_string(), "POST".to_string()]
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

const fn default_cors_max_age() -> u64 {
    30 * 60
}

/// Switches that turn off built-in features. Everything is on by default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DisableConfig {
    /// Skip the CORS middleware.
    #[serde(default)]
    pub cors: bool,
    /// Skip the liveness route.
    #[serde(default)]
    pub liveness: bool,
    /// Skip the metrics route.
    #[serde(default)]
    pub metrics: bool,
    /// Skip the readiness route.
    #[serde(default)]
    pub readiness: bool,
    /// Skip the request identifier middleware.
    #[serde(default)]
    pub request_id: bool,
    /// Skip the request logger middleware.
    #[serde(default)]
    pub request_logger: bool,
    /// Do not watch for termination signals.
    #[serde(default)]
    pub signal_handling: bool,
    /// Skip the version route.
    #[serde(default)]
    pub version: bool,
}

/// Request identifier settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RequestIdentifierConfig {
    /// Response header carrying the identifier.
    #[serde(default = "default_request_id_header")]
    pub header: String,
}

impl Default for RequestIdentifierConfig {
    fn default() -> Self {
        Self {
            header: default_request_id_header(),
        }
    }
}

fn default_request_id_header() -> String {
    "X-Request-ID".to_string()
}

/// What the lifecycle controller does with an unclassified server error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedErrorPolicy {
    /// Log the error and keep waiting for a terminal event.
    #[default]
    Continue,
    /// Treat the error as terminal and run shutdown handlers.
    Shutdown,
}

/// Lifecycle policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Handling of unclassified server errors.
    #[serde(default)]
    pub unclassified_errors: UnclassifiedErrorPolicy,

    /// Run shutdown handlers when the address is already in use.
    #[serde(default = "default_true")]
    pub shutdown_on_bind_failure: bool,

    /// Seconds to wait for in-flight connections after the listener closes.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            unclassified_errors: UnclassifiedErrorPolicy::default(),
            shutdown_on_bind_failure: true,
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

impl LifecycleConfig {
    /// Connection drain budget.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

const fn default_drain_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: hestia_telemetry::LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: hestia_telemetry::LogFormat::default(),
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Converts this section into the telemetry crate's logging setup.
    #[must_use]
    pub fn to_log_config(&self) -> hestia_telemetry::LogConfig {
        hestia_telemetry::LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            include_location: self.include_location,
            include_target: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
