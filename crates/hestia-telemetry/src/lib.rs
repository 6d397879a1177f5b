//! Logging and metrics plumbing for Hestia services.
//!
//! [`init_logging`] installs the global `tracing` subscriber. The request
//! logger feeds two series into the Prometheus recorder owned by
//! [`MetricsRegistry`]:
//!
//! - `hestia_http_requests_total{method,status}` counts finished requests
//! - `hestia_http_request_duration_seconds{method}` observes their latency
//!
//! ```rust,ignore
//! use hestia_telemetry::{init_logging, LogConfig, MetricsRegistry};
//!
//! init_logging(&LogConfig::production())?;
//! let exposition = MetricsRegistry::global().render();
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::MetricsRegistry;

/// Shorthand for results of this crate.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
