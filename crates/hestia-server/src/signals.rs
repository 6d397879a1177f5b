//! Termination signal watchers.
//!
//! A [`SignalWatcher`] is injected into each server instead of installing a
//! process-wide hook, so several servers in one process (or one test run)
//! stay isolated.
//!
//! - [`OsSignalWatcher`] waits for SIGINT or SIGTERM (Ctrl-C off Unix).
//! - [`ManualSignalWatcher`] delivers whatever is passed to
//!   [`raise`](ManualSignalWatcher::raise).

use crate::error::SignalError;
use hestia_core::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// A termination signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT (Ctrl-C).
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// Any other named signal.
    Other(String),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("SIGINT"),
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Source of the first termination signal of a run.
pub trait SignalWatcher: Send + Sync + 'static {
    /// Resolves with the first signal observed after the call.
    fn watch(&self) -> BoxFuture<'static, Result<Signal, SignalError>>;
}

/// Watches the process for SIGINT and SIGTERM.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignalWatcher;

impl OsSignalWatcher {
    /// Creates the watcher. Nothing is registered until [`watch`](SignalWatcher::watch)
    /// is polled.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SignalWatcher for OsSignalWatcher {
    fn watch(&self) -> BoxFuture<'static, Result<Signal, SignalError>> {
        Box::pin(wait_for_os_signal())
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> Result<Signal, SignalError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).map_err(|source| SignalError::Register {
        signal: "SIGTERM",
        source,
    })?;
    let mut interrupt = signal(SignalKind::interrupt()).map_err(|source| SignalError::Register {
        signal: "SIGINT",
        source,
    })?;

    tokio::select! {
        received = terminate.recv() => received.map(|()| Signal::Terminate).ok_or(SignalError::Closed),
        received = interrupt.recv() => received.map(|()| Signal::Interrupt).ok_or(SignalError::Closed),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> Result<Signal, SignalError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| SignalError::Register {
            signal: "SIGINT",
            source,
        })?;
    Ok(Signal::Interrupt)
}

/// Watcher driven by the program itself.
///
/// Clones share state: raising on one clone is seen by watchers created from
/// any other. A signal raised before [`watch`](SignalWatcher::watch) is
/// called is still delivered.
///
/// # Example
///
/// ```
/// use hestia_server::{ManualSignalWatcher, Signal, SignalWatcher};
///
/// # tokio_test::block_on(async {
/// let watcher = ManualSignalWatcher::new();
/// watcher.raise(Signal::Terminate);
/// assert_eq!(watcher.watch().await.unwrap(), Signal::Terminate);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ManualSignalWatcher {
    sender: Arc<watch::Sender<Option<Signal>>>,
}

impl Default for ManualSignalWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualSignalWatcher {
    /// Creates a watcher with no pending signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Delivers `signal` to current and future watchers. Only the first
    /// raised signal is kept.
    pub fn raise(&self, signal: Signal) {
        self.sender.send_if_modified(|pending| {
            if pending.is_some() {
                return false;
            }
            *pending = Some(signal);
            true
        });
    }

    /// Returns the pending signal, if one was raised.
    #[must_use]
    pub fn pending(&self) -> Option<Signal> {
        self.sender.borrow().clone()
    }
}

impl SignalWatcher for ManualSignalWatcher {
    fn watch(&self) -> BoxFuture<'static, Result<Signal, SignalError>> {
        let mut receiver = self.sender.subscribe();
        Box::pin(async move {
            let pending = receiver
                .wait_for(Option::is_some)
                .await
                .map_err(|_| SignalError::Closed)?
                .clone();
            pending.ok_or(SignalError::Closed)
        })
    }
}
