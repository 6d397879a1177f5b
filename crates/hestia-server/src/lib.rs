//! # Hestia Server
//!
//! HTTP serving and lifecycle control for Hestia services.
//!
//! - Probe, metrics and version routes registered on a [`Mux`]
//! - The middleware pipeline (CORS, request logger, request identifier)
//! - HTTP/1.1 serving via Hyper with graceful connection shutdown
//! - Signal-driven shutdown with ordered [`ShutdownHandlers`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use hestia_middleware::{handler_fn, Response, ResponseExt};
//! use hestia_server::{Mux, Server, ServerConfig, ShutdownError};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut mux = Mux::new();
//!     mux.route(
//!         Method::GET,
//!         "/hello",
//!         handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "hello") }),
//!     )?;
//!
//!     let config = ServerConfig::builder()
//!         .port(8080)
//!         .version(env!("CARGO_PKG_VERSION"))
//!         .on_shutdown_named("close_db", |_event| async { Ok::<(), ShutdownError>(()) })
//!         .build();
//!
//!     let server = Server::new(config, mux)?;
//!     server.start().await;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hestia-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod events;
mod handlers;
mod lifecycle;
mod probe;
mod router;
mod server;
mod shutdown;
mod signals;

pub use config::{cors_config, ServerConfig, ServerConfigBuilder};
pub use error::{ProbeError, RouteError, ServeError, ServerError, ShutdownError, SignalError};
pub use events::{LifecycleEvent, ServerState};
pub use handlers::{MetricsEndpoint, VersionEndpoint, PROMETHEUS_CONTENT_TYPE};
pub use lifecycle::{Server, ServerHandle, CLOSE_LISTENER_HANDLER};
pub use probe::{Probe, ProbeCheck, ProbeEndpoint};
pub use router::{Mux, PathParams};
pub use shutdown::{
    ConnectionGuard, ConnectionTracker, HandlerOutcome, ShutdownHandlers, ShutdownHook,
    ShutdownReport, ShutdownSignal,
};
pub use signals::{ManualSignalWatcher, OsSignalWatcher, Signal, SignalWatcher};
