//! # Hestia
//!
//! **Bootstrap layer for HTTP services**
//!
//! Hestia wraps a route multiplexer with everything a service needs to run
//! in production:
//!
//! - Liveness, readiness, metrics and version routes
//! - CORS negotiation, access logging and request identifiers
//! - Typed, layered configuration
//! - Signal-driven graceful shutdown with ordered shutdown handlers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hestia::prelude::*;
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings: HestiaConfig = ConfigLoader::new()
//!         .with_optional_file("hestia.toml")?
//!         .with_env_prefix("HESTIA")
//!         .load()?;
//!     init_logging(&settings.logging.to_log_config())?;
//!
//!     let mut mux = Mux::new();
//!     mux.route(
//!         Method::GET,
//!         "/hello/{name}",
//!         handler_fn(|ctx, _req| {
//!             let name = ctx
//!                 .get_extension::<PathParams>()
//!                 .and_then(|p| p.get("name"))
//!                 .unwrap_or("world")
//!                 .to_string();
//!             async move { Response::text(StatusCode::OK, format!("hello {name}")) }
//!         }),
//!     )?;
//!
//!     let config = ServerConfig::builder()
//!         .options(settings.server)
//!         .readiness_check(|| async { Ok(()) })
//!         .on_shutdown_named("flush", |_event| async { Ok(()) })
//!         .build();
//!
//!     let server = Server::new(config, mux)?;
//!     server.start().await;
//!
//!     let code = server.handle().shutdown_report().map_or(0, |r| r.exit_code());
//!     std::process::exit(code);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → CORS → RequestLogger → RequestId → user middlewares → Mux → handler
//! ```

#![doc(html_root_url = "https://docs.rs/hestia/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use hestia_core as core;

// Re-export configuration
pub use hestia_config as config;

// Re-export middleware types
pub use hestia_middleware as middleware;

// Re-export server types
pub use hestia_server as server;

// Re-export telemetry
pub use hestia_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hestia::prelude::*;
///
/// let config = ServerConfig::builder().port(0).build();
/// assert_eq!(config.options().port, 0);
/// ```
pub mod prelude {
    pub use hestia_core::{LogSink, MemorySink, RequestId, SharedSink, TracingSink};

    pub use hestia_config::{ConfigLoader, HestiaConfig, ServerOptions, UnclassifiedErrorPolicy};

    pub use hestia_middleware::stages::{CorsConfig, CorsMiddleware};
    pub use hestia_middleware::{
        handler_fn, Handler, Middleware, MiddlewareContext, Next, Request, Response, ResponseExt,
    };

    pub use hestia_server::{
        LifecycleEvent, ManualSignalWatcher, Mux, PathParams, ProbeError, Server, ServerConfig,
        ServerHandle, ServerState, ShutdownError, ShutdownReport, Signal,
    };

    pub use hestia_telemetry::{init_logging, LogConfig, LogFormat, MetricsRegistry};
}
