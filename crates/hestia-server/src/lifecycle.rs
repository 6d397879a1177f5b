//! The lifecycle controller.
//!
//! [`Server::start`] runs three activities until a terminal event arrives:
//!
//! - the serve activity binds the listener and serves requests. It reports
//!   `AddressInUse`, other bind failures and accept failures, and a
//!   `ListenerClosed` event once the listener has been closed;
//! - the signal watcher reports the first termination signal;
//! - the event loop, running inside `start`, handles events one at a time
//!   in arrival order.
//!
//! | Event | Handling |
//! |-------|----------|
//! | listener closed | log, stop |
//! | signal | log, run shutdown handlers, stop |
//! | address in use | log, run shutdown handlers if configured, stop |
//! | unclassified | log, then continue or shut down per policy |
//!
//! Shutdown handlers run at most once per server. The last one, registered
//! by the server itself, closes the listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use hestia_server::{Mux, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), hestia_server::ServerError> {
//! let config = ServerConfig::builder()
//!     .port(8080)
//!     .on_shutdown_named("flush_cache", |_event| async { Ok(()) })
//!     .build();
//!
//! let server = Server::new(config, Mux::new())?;
//! server.start().await;
//!
//! let code = server.handle().shutdown_report().map_or(0, |r| r.exit_code());
//! std::process::exit(code);
//! # }
//! ```

use crate::config::ServerConfig;
use crate::error::{ServeError, ServerError};
use crate::events::{LifecycleEvent, ServerState};
use crate::handlers::{MetricsEndpoint, VersionEndpoint};
use crate::probe::ProbeEndpoint;
use crate::router::Mux;
use crate::server::{HttpServer, ServeSettings};
use crate::shutdown::{ShutdownHandlers, ShutdownReport, ShutdownSignal};
use crate::signals::SignalWatcher;
use hestia_config::{ServerOptions, UnclassifiedErrorPolicy};
use hestia_core::SharedSink;
use hestia_middleware::stages::{CorsMiddleware, RequestIdMiddleware, RequestLoggerMiddleware};
use hestia_middleware::Pipeline;
use http::Method;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Name of the shutdown handler that closes the listener.
pub const CLOSE_LISTENER_HANDLER: &str = "close_listener";

type EventSender = mpsc::UnboundedSender<LifecycleEvent>;

/// An HTTP server with a managed lifecycle.
///
/// Exactly one call to [`start`](Self::start) is expected per server. Later
/// calls log a warning and return immediately.
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    options: ServerOptions,
    http: Arc<HttpServer>,
    pipeline_stages: Vec<&'static str>,
    shutdown: ShutdownHandlers,
    server_log: SharedSink,
    signals: Arc<dyn SignalWatcher>,
    close: ShutdownSignal,
    state: watch::Sender<ServerState>,
    local_addr: Mutex<Option<SocketAddr>>,
    handlers_ran: AtomicBool,
    report: Mutex<Option<ShutdownReport>>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.inner.options.bind_address())
            .field("state", &self.state())
            .field("stages", &self.inner.pipeline_stages)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Builds a server around `mux`.
    ///
    /// Registers the enabled probe, metrics and version routes on `mux` and
    /// wraps it in the middleware pipeline: CORS outermost, then the request
    /// logger, then the request identifier, then the configured extra
    /// middlewares.
    ///
    /// # Errors
    ///
    /// Fails when the options are invalid, a built-in route collides with a
    /// route already on `mux`, or the request identifier header name is not a
    /// valid header name.
    pub fn new(mut config: ServerConfig, mut mux: Mux) -> Result<Self, ServerError> {
        let options = config.options().clone();
        options.validate()?;

        let disable = &options.disable;
        if !disable.liveness {
            let endpoint = ProbeEndpoint::new("liveness", config.liveness().clone());
            mux.route(Method::GET, &options.liveness.path, endpoint)?;
        }
        if !disable.readiness {
            let endpoint = ProbeEndpoint::new("readiness", config.readiness().clone());
            mux.route(Method::GET, &options.readiness.path, endpoint)?;
        }
        if !disable.metrics {
            let endpoint = MetricsEndpoint::new(config.metrics_registry());
            mux.route(Method::GET, &options.metrics.path, endpoint)?;
        }
        if !disable.version {
            let endpoint = VersionEndpoint::new(options.version.value.clone());
            mux.route(Method::GET, &options.version.path, endpoint)?;
        }

        let pipeline = build_pipeline(&config, &options, mux)?;
        let pipeline_stages = pipeline.stage_names();

        let close = ShutdownSignal::new();
        let listener_close = close.clone();
        let shutdown = config
            .take_shutdown_handlers()
            .add_named(CLOSE_LISTENER_HANDLER, move |_event| {
                listener_close.trigger();
                std::future::ready(Ok(()))
            });

        let (state, _) = watch::channel(ServerState::Idle);
        let http = HttpServer::new(ServeSettings::from_options(&options), pipeline);

        Ok(Self {
            inner: Arc::new(Inner {
                http: Arc::new(http),
                pipeline_stages,
                shutdown,
                server_log: config.server_log(),
                signals: config.signal_watcher(),
                close,
                state,
                local_addr: Mutex::new(None),
                handlers_ran: AtomicBool::new(false),
                report: Mutex::new(None),
                options,
            }),
        })
    }

    /// Runs the server until a terminal event has been handled.
    ///
    /// Nothing is returned: the outcome is written to the server event log
    /// and, when shutdown handlers ran, kept as a [`ShutdownReport`].
    pub async fn start(&self) {
        let inner = &self.inner;
        let claimed = inner.state.send_if_modified(|state| {
            if *state == ServerState::Idle {
                *state = ServerState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            inner.server_log.log("server already started");
            tracing::warn!(state = %self.state(), "start called on a server that is not idle");
            return;
        }

        let addr = inner.options.bind_address();
        inner.server_log.log(&format!("starting server on '{addr}'..."));
        tracing::info!(addr = %addr, "Starting server");

        let (events, mut receiver) = mpsc::unbounded_channel();

        let serve_task = tokio::spawn(serve(Arc::clone(inner), events.clone()));
        let signal_task = if inner.options.disable.signal_handling {
            None
        } else {
            Some(tokio::spawn(forward_signal(
                Arc::clone(&inner.signals),
                events.clone(),
            )))
        };
        drop(events);

        let policy = inner.options.lifecycle.unclassified_errors;
        while let Some(event) = receiver.recv().await {
            if inner.handle_event(event, policy).await {
                break;
            }
        }
        drop(receiver);

        inner.close.trigger();
        if let Err(e) = serve_task.await {
            tracing::error!(error = %e, "Serve activity failed");
        }
        if let Some(task) = signal_task {
            task.abort();
        }

        inner.state.send_replace(ServerState::Stopped);
        tracing::info!("Server stopped");
    }

    /// Closes the listener, which ends the run with a "listener closed"
    /// event. See [`ServerHandle::stop`].
    pub fn stop(&self) {
        self.handle().stop();
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Returns a handle for controlling the server from other tasks.
    #[must_use]
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns the names of the pipeline stages, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> &[&'static str] {
        &self.inner.pipeline_stages
    }
}

/// Cloneable handle to a [`Server`].
#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ServerHandle {
    /// Closes the listener.
    ///
    /// Safe to call from any task, any number of times. Only the first call
    /// has an effect, and it never runs the shutdown handlers by itself.
    pub fn stop(&self) {
        if self.inner.close.trigger() {
            tracing::debug!("Stop requested");
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Waits until the state is `target` or later.
    pub async fn wait_for_state(&self, target: ServerState) -> ServerState {
        let mut receiver = self.inner.state.subscribe();
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = receiver.wait_for(|state| *state >= target).await;
        self.state()
    }

    /// Returns the bound address once the listener is open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// Returns the outcome of the shutdown handlers, if they ran.
    #[must_use]
    pub fn shutdown_report(&self) -> Option<ShutdownReport> {
        self.inner.report.lock().clone()
    }
}

impl Inner {
    /// Handles one event. Returns `true` when the run is over.
    async fn handle_event(&self, event: LifecycleEvent, policy: UnclassifiedErrorPolicy) -> bool {
        let terminal = event.is_terminal(policy);
        if terminal {
            self.state.send_replace(ServerState::ShuttingDown);
        }

        match &event {
            LifecycleEvent::ListenerClosed => {
                self.server_log.log("server was closed");
                tracing::info!("Listener closed");
            }
            LifecycleEvent::Signal(signal) => {
                self.server_log.log(&format!("server received signal: {signal}"));
                tracing::info!(signal = %signal, "Termination signal received");
                self.run_shutdown_handlers(&event).await;
            }
            LifecycleEvent::AddressInUse { addr } => {
                self.server_log
                    .log(&format!("failed to start server: '{addr}' is already in use"));
                tracing::error!(addr = %addr, "Address already in use");
                if self.options.lifecycle.shutdown_on_bind_failure {
                    self.run_shutdown_handlers(&event).await;
                }
            }
            LifecycleEvent::Unclassified(message) => {
                self.server_log.log(&format!("unknown event: {message}"));
                tracing::warn!(error = %message, terminal, "Unclassified server error");
                if terminal {
                    self.run_shutdown_handlers(&event).await;
                }
            }
        }

        terminal
    }

    async fn run_shutdown_handlers(&self, event: &LifecycleEvent) {
        if self.handlers_ran.swap(true, Ordering::SeqCst) {
            return;
        }

        let report = self.shutdown.run(event, self.server_log.as_ref()).await;
        let failures = report.failures().count();
        if failures > 0 {
            tracing::warn!(failures, "Shutdown handlers failed");
        }
        *self.report.lock() = Some(report);
    }
}

/// The serve activity.
async fn serve(inner: Arc<Inner>, events: EventSender) {
    let addr = inner.options.bind_address();
    let listener = match inner.http.bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let event = match e {
                ServeError::AddressInUse { addr, .. } => LifecycleEvent::AddressInUse { addr },
                other => LifecycleEvent::Unclassified(other.to_string()),
            };
            let _ = events.send(event);

            // Nothing to close, but stop() must still end the run.
            inner.close.triggered().await;
            let _ = events.send(LifecycleEvent::ListenerClosed);
            return;
        }
    };

    let local_addr = listener.local_addr().ok();
    *inner.local_addr.lock() = local_addr;
    inner.state.send_if_modified(|state| {
        if *state == ServerState::Starting {
            *state = ServerState::Running;
            true
        } else {
            false
        }
    });
    tracing::info!(addr = ?local_addr, "Listening");

    let errors = events.clone();
    Arc::clone(&inner.http)
        .serve(listener, inner.close.clone(), move |e| {
            let _ = errors.send(LifecycleEvent::Unclassified(e.to_string()));
        })
        .await;

    let _ = events.send(LifecycleEvent::ListenerClosed);
}

/// The signal watcher activity.
async fn forward_signal(watcher: Arc<dyn SignalWatcher>, events: EventSender) {
    match watcher.watch().await {
        Ok(signal) => {
            let _ = events.send(LifecycleEvent::Signal(signal));
        }
        Err(e) => tracing::warn!(error = %e, "Signal watcher stopped"),
    }
}

fn build_pipeline(
    config: &ServerConfig,
    options: &ServerOptions,
    mux: Mux,
) -> Result<Pipeline, ServerError> {
    let disable = &options.disable;
    let mut builder = Pipeline::builder();

    if !disable.cors {
        builder = builder.add_stage(CorsMiddleware::new(config.cors()));
    }
    if !disable.request_logger {
        let mut logger = RequestLoggerMiddleware::new(config.request_log());
        if !disable.metrics {
            logger = logger.with_metrics(config.metrics_registry());
        }
        builder = builder.add_stage(logger);
    }
    if !disable.request_id {
        let header = &options.request_id.header;
        let stage = RequestIdMiddleware::with_header(header).map_err(|source| {
            ServerError::RequestIdHeader {
                header: header.clone(),
                source,
            }
        })?;
        builder = builder.add_stage(stage);
    }

    Ok(builder
        .add_stages(config.middlewares().iter().cloned())
        .build(mux))
}
