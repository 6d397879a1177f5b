//! Server configuration.
//!
//! [`ServerConfig`] joins the serializable [`ServerOptions`] with the parts
//! that only exist in code: probe checks, shutdown handlers, extra
//! middlewares, log sinks, the signal watcher and the metrics registry.
//!
//! # Example
//!
//! ```rust
//! use hestia_server::{ProbeError, ServerConfig};
//!
//! let config = ServerConfig::builder()
//!     .address("127.0.0.1")
//!     .port(0)
//!     .version("1.4.2")
//!     .readiness_check(|| async { Ok::<(), ProbeError>(()) })
//!     .on_shutdown(|_event| async { Ok(()) })
//!     .build();
//!
//! assert_eq!(config.options().bind_address(), "127.0.0.1:0");
//! assert_eq!(config.shutdown_handlers().len(), 1);
//! ```

use crate::error::{ProbeError, ShutdownError};
use crate::events::LifecycleEvent;
use crate::probe::Probe;
use crate::shutdown::ShutdownHandlers;
use crate::signals::{OsSignalWatcher, SignalWatcher};
use hestia_config::{CorsOptions, ServerOptions, UnclassifiedErrorPolicy};
use hestia_core::{SharedSink, TracingSink};
use hestia_middleware::stages::CorsConfig;
use hestia_middleware::{BoxedMiddleware, Middleware};
use hestia_telemetry::MetricsRegistry;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Complete configuration of a [`Server`](crate::Server).
///
/// Use [`ServerConfig::builder()`] to construct instances.
#[derive(Clone)]
pub struct ServerConfig {
    options: ServerOptions,
    liveness: Probe,
    readiness: Probe,
    shutdown: ShutdownHandlers,
    middlewares: Vec<BoxedMiddleware>,
    server_log: SharedSink,
    request_log: SharedSink,
    signals: Arc<dyn SignalWatcher>,
    metrics: Option<MetricsRegistry>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("options", &self.options)
            .field("liveness", &self.liveness)
            .field("readiness", &self.readiness)
            .field("shutdown", &self.shutdown)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerConfig {
    /// Creates a builder with default options.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Returns the serializable options.
    #[must_use]
    pub const fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Returns the liveness probe.
    #[must_use]
    pub const fn liveness(&self) -> &Probe {
        &self.liveness
    }

    /// Returns the readiness probe.
    #[must_use]
    pub const fn readiness(&self) -> &Probe {
        &self.readiness
    }

    /// Returns the shutdown handlers in registration order.
    #[must_use]
    pub const fn shutdown_handlers(&self) -> &ShutdownHandlers {
        &self.shutdown
    }

    /// Returns the extra middlewares, outermost first.
    #[must_use]
    pub fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    /// Returns the server event sink.
    #[must_use]
    pub fn server_log(&self) -> SharedSink {
        Arc::clone(&self.server_log)
    }

    /// Returns the access line sink.
    #[must_use]
    pub fn request_log(&self) -> SharedSink {
        Arc::clone(&self.request_log)
    }

    /// Returns the signal watcher.
    #[must_use]
    pub fn signal_watcher(&self) -> Arc<dyn SignalWatcher> {
        Arc::clone(&self.signals)
    }

    /// Returns the metrics registry, installing the process-wide one if none
    /// was configured.
    #[must_use]
    pub fn metrics_registry(&self) -> MetricsRegistry {
        self.metrics.clone().unwrap_or_else(MetricsRegistry::global)
    }

    /// Returns the CORS settings derived from the options.
    #[must_use]
    pub fn cors(&self) -> CorsConfig {
        cors_config(&self.options.cors)
    }

    pub(crate) fn take_shutdown_handlers(&mut self) -> ShutdownHandlers {
        std::mem::take(&mut self.shutdown)
    }
}

/// Converts the serializable CORS options into middleware settings.
#[must_use]
pub fn cors_config(options: &CorsOptions) -> CorsConfig {
    CorsConfig::new()
        .allow_origins(options.allow_origins.iter().cloned())
        .allow_methods(options.allow_methods.iter().cloned())
        .allow_headers(&options.allow_headers)
        .expose_headers(options.expose_headers.iter().cloned())
        .allow_credentials(options.allow_credentials)
        .passthrough(options.passthrough)
        .max_age(options.max_age())
}

/// Builder for [`ServerConfig`].
#[must_use]
pub struct ServerConfigBuilder {
    options: ServerOptions,
    liveness: Probe,
    readiness: Probe,
    shutdown: ShutdownHandlers,
    middlewares: Vec<BoxedMiddleware>,
    server_log: SharedSink,
    request_log: SharedSink,
    signals: Arc<dyn SignalWatcher>,
    metrics: Option<MetricsRegistry>,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            options: ServerOptions::default(),
            liveness: Probe::new(),
            readiness: Probe::new(),
            shutdown: ShutdownHandlers::new(),
            middlewares: Vec::new(),
            server_log: Arc::new(TracingSink::server()),
            request_log: Arc::new(TracingSink::access()),
            signals: Arc::new(OsSignalWatcher::new()),
            metrics: None,
        }
    }
}

impl fmt::Debug for ServerConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfigBuilder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ServerConfigBuilder {
    /// Replaces every serializable option.
    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the listen address (host part).
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.options.address = address.into();
        self
    }

    /// Sets the listen port. Port `0` picks a free port.
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Sets the string served on the version route.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.options.version.value = version.into();
        self
    }

    /// Sets the CORS options.
    pub fn cors(mut self, cors: CorsOptions) -> Self {
        self.options.cors = cors;
        self
    }

    /// Sets what an unclassified serve error does.
    pub fn unclassified_errors(mut self, policy: UnclassifiedErrorPolicy) -> Self {
        self.options.lifecycle.unclassified_errors = policy;
        self
    }

    /// Appends a liveness check.
    pub fn liveness_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
    {
        self.liveness = self.liveness.add_check(check);
        self
    }

    /// Appends a readiness check.
    pub fn readiness_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
    {
        self.readiness = self.readiness.add_check(check);
        self
    }

    /// Appends a shutdown handler.
    pub fn on_shutdown<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(&LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        self.shutdown = self.shutdown.add(handler);
        self
    }

    /// Appends a named shutdown handler.
    pub fn on_shutdown_named<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        self.shutdown = self.shutdown.add_named(name, handler);
        self
    }

    /// Appends a middleware. Extra middlewares run inside the built-in ones,
    /// in the order they were added.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Sets the sink for server events.
    pub fn server_log(mut self, sink: SharedSink) -> Self {
        self.server_log = sink;
        self
    }

    /// Sets the sink for access lines.
    pub fn request_log(mut self, sink: SharedSink) -> Self {
        self.request_log = sink;
        self
    }

    /// Sets the signal watcher.
    pub fn signal_watcher<W: SignalWatcher>(mut self, watcher: W) -> Self {
        self.signals = Arc::new(watcher);
        self
    }

    /// Sets the metrics registry the request logger records into and the
    /// metrics route renders.
    pub fn metrics_registry(mut self, registry: MetricsRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Builds the configuration. Options are validated by
    /// [`Server::new`](crate::Server::new).
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            options: self.options,
            liveness: self.liveness,
            readiness: self.readiness,
            shutdown: self.shutdown,
            middlewares: self.middlewares,
            server_log: self.server_log,
            request_log: self.request_log,
            signals: self.signals,
            metrics: self.metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::ManualSignalWatcher;
    use hestia_core::{LogSink, MemorySink};
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.options().bind_address(), "0.0.0.0:8000");
        assert!(config.liveness().is_empty());
        assert!(config.readiness().is_empty());
        assert!(config.shutdown_handlers().is_empty());
        assert!(config.middlewares().is_empty());
    }

    #[test]
    fn test_builder_collects_handlers_in_order() {
        let config = ServerConfig::builder()
            .on_shutdown_named("flush", |_| async { Ok(()) })
            .on_shutdown(|_| async { Ok(()) })
            .liveness_check(|| async { Ok(()) })
            .readiness_check(|| async { Ok(()) })
            .readiness_check(|| async { Err(ProbeError::new("down")) })
            .build();

        assert_eq!(config.shutdown_handlers().names(), vec!["flush", "shutdown_1"]);
        assert_eq!(config.liveness().len(), 1);
        assert_eq!(config.readiness().len(), 2);
    }

    #[test]
    fn test_custom_sinks() {
        let server_log = MemorySink::new();
        let config = ServerConfig::builder()
            .server_log(Arc::new(server_log.clone()))
            .signal_watcher(ManualSignalWatcher::new())
            .build();

        config.server_log().log("hello");
        assert_eq!(server_log.lines(), vec!["hello"]);
    }

    #[test]
    fn test_cors_conversion() {
        let options = CorsOptions {
            allow_credentials: true,
            allow_headers: vec!["content-type".to_string()],
            allow_methods: vec!["PUT".to_string()],
            allow_origins: vec!["https://a.example".to_string()],
            passthrough: true,
            expose_headers: vec!["X-Total".to_string()],
            max_age_secs: 60,
        };

        let cors = cors_config(&options);
        assert!(cors.is_origin_allowed("https://a.example"));
        assert!(!cors.is_origin_allowed("http://localhost:3000"));
        assert!(cors.is_method_allowed("PUT"));
        assert!(!cors.is_method_allowed("GET"));
        assert!(cors.is_header_allowed("Content-Type"));
        assert!(cors.is_passthrough());
        assert_eq!(
            cors,
            CorsConfig::new()
                .allow_origins(["https://a.example"])
                .allow_methods(["PUT"])
                .allow_headers(["Content-Type"])
                .expose_headers(["X-Total"])
                .allow_credentials(true)
                .passthrough(true)
                .max_age(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_policy_setter() {
        let config = ServerConfig::builder()
            .unclassified_errors(UnclassifiedErrorPolicy::Shutdown)
            .build();
        assert_eq!(
            config.options().lifecycle.unclassified_errors,
            UnclassifiedErrorPolicy::Shutdown
        );
    }
}
