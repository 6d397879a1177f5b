//! Shutdown coordination.
//!
//! - [`ShutdownSignal`] closes the listener and tells open connections to
//!   finish their in-flight request.
//! - [`ConnectionTracker`] counts open connections so the serve activity can
//!   wait for them to drain.
//! - [`ShutdownHandlers`] runs caller cleanup in registration order and
//!   records the outcome in a [`ShutdownReport`].

use crate::error::ShutdownError;
use crate::events::LifecycleEvent;
use hestia_core::{BoxFuture, LogSink};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// One-way switch that closes the listener.
///
/// Clones share the switch. Triggering is idempotent.
///
/// ```
/// use hestia_server::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// let listener_side = signal.clone();
///
/// assert!(signal.trigger());
/// assert!(!signal.trigger());
/// assert!(listener_side.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Triggers the signal. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        !self.sender.send_replace(true)
    }

    /// Returns whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes once the signal is triggered, immediately if it already was.
    pub fn triggered(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async move {
            // The sender lives as long as any clone of the signal; a closed
            // channel can only mean every owner is gone.
            let _ = receiver.wait_for(|closed| *closed).await;
        }
    }
}

/// Counts open connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection until the returned guard is dropped.
    #[must_use]
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Completes when no connection is open.
    pub async fn drained(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Keeps a connection counted while alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// A shutdown handler: receives the triggering event.
pub type ShutdownHook = Arc<
    dyn Fn(&LifecycleEvent) -> BoxFuture<'static, Result<(), ShutdownError>> + Send + Sync,
>;

/// Ordered list of shutdown handlers.
///
/// Handlers run one at a time in registration order. A failing handler is
/// logged and recorded, and the next one still runs.
///
/// ```
/// use hestia_server::{LifecycleEvent, ShutdownError, ShutdownHandlers};
/// use hestia_core::MemorySink;
///
/// let handlers = ShutdownHandlers::new()
///     .add(|_event| async { Ok(()) })
///     .add(|_event| async { Err(ShutdownError::new("cache flush failed")) });
///
/// # tokio_test::block_on(async {
/// let sink = MemorySink::new();
/// let report = handlers.run(&LifecycleEvent::ListenerClosed, &sink).await;
/// assert_eq!(report.failures().count(), 1);
/// assert_eq!(report.exit_code(), 1);
/// # });
/// ```
#[derive(Clone, Default)]
#[must_use]
pub struct ShutdownHandlers {
    hooks: Vec<(String, ShutdownHook)>,
}

impl fmt::Debug for ShutdownHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandlers")
            .field("names", &self.names())
            .finish()
    }
}

impl ShutdownHandlers {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn add<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(&LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        let name = format!("shutdown_{}", self.hooks.len());
        self.add_named(name, handler)
    }

    /// Appends a handler with a name used in logs and the report.
    pub fn add_named<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ShutdownError>> + Send + 'static,
    {
        let hook: ShutdownHook = Arc::new(move |event| Box::pin(handler(event)));
        self.hooks.push((name.into(), hook));
        self
    }

    /// Appends every handler of `other`.
    pub fn merge(mut self, other: Self) -> Self {
        self.hooks.extend(other.hooks);
        self
    }

    /// Returns the number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Returns the handler names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Runs every handler for `event`, logging each outcome to `sink`.
    pub async fn run(&self, event: &LifecycleEvent, sink: &dyn LogSink) -> ShutdownReport {
        sink.log(&format!("running {} shutdown handlers...", self.hooks.len()));

        let mut outcomes = Vec::with_capacity(self.hooks.len());
        for (index, (name, hook)) in self.hooks.iter().enumerate() {
            let error = match hook(event).await {
                Ok(()) => {
                    sink.log(&format!("shutdown handler {index} succeeded"));
                    tracing::debug!(handler = %name, index, "Shutdown handler completed");
                    None
                }
                Err(e) => {
                    sink.log(&format!("shutdown handler {index} failed with: {e}"));
                    tracing::warn!(handler = %name, index, error = %e, "Shutdown handler failed");
                    Some(e.to_string())
                }
            };
            outcomes.push(HandlerOutcome {
                index,
                name: name.clone(),
                error,
            });
        }

        ShutdownReport {
            trigger: event.to_string(),
            outcomes,
        }
    }
}

/// Result of one shutdown handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// Position in registration order.
    pub index: usize,
    /// Handler name.
    pub name: String,
    /// Failure message, `None` on success.
    pub error: Option<String>,
}

impl HandlerOutcome {
    /// Returns whether the handler succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What happened when the shutdown handlers ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    trigger: String,
    outcomes: Vec<HandlerOutcome>,
}

impl ShutdownReport {
    /// Description of the event that triggered shutdown.
    #[must_use]
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Every handler outcome, in the order the handlers ran.
    #[must_use]
    pub fn outcomes(&self) -> &[HandlerOutcome] {
        &self.outcomes
    }

    /// The failed handlers.
    pub fn failures(&self) -> impl Iterator<Item = &HandlerOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Process exit code: `0` when every handler succeeded, `1` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failures().next().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hestia_core::MemorySink;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the order handlers ran in.
    #[derive(Clone, Default)]
    struct Order(Arc<Mutex<Vec<usize>>>);

    impl Order {
        fn push(&self, value: usize) {
            self.0.lock().unwrap().push(value);
        }

        fn values(&self) -> Vec<usize> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_shutdown_signal_trigger_once() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_completes_after_trigger() {
        let signal = ShutdownSignal::new();
        let waiter = signal.triggered();

        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("triggered should complete");
    }

    #[tokio::test]
    async fn test_triggered_completes_immediately_if_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.triggered())
            .await
            .expect("triggered should complete immediately");
    }

    #[tokio::test]
    async fn test_tracker_drains() {
        let tracker = ConnectionTracker::new();
        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.active(), 2);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(first);
            drop(second);
        });

        tokio::time::timeout(Duration::from_secs(1), tracker.drained())
            .await
            .expect("tracker should drain");
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn test_tracker_drained_when_empty() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(Duration::from_millis(10), tracker.drained())
            .await
            .expect("empty tracker is drained");
    }

    #[tokio::test]
    async fn test_handlers_run_in_order_and_continue_after_failure() {
        let order = Order::default();
        let (a, b, c) = (order.clone(), order.clone(), order.clone());

        let handlers = ShutdownHandlers::new()
            .add(move |_| {
                let order = a.clone();
                async move {
                    order.push(0);
                    Ok(())
                }
            })
            .add(move |_| {
                let order = b.clone();
                async move {
                    order.push(1);
                    Err(ShutdownError::new("boom"))
                }
            })
            .add(move |_| {
                let order = c.clone();
                async move {
                    order.push(2);
                    Ok(())
                }
            });

        let sink = MemorySink::new();
        let report = handlers
            .run(&LifecycleEvent::Signal(crate::Signal::Interrupt), &sink)
            .await;

        assert_eq!(order.values(), vec![0, 1, 2]);
        assert_eq!(report.trigger(), "received signal: SIGINT");
        assert_eq!(report.outcomes().len(), 3);
        assert_eq!(report.failures().map(|o| o.index).collect::<Vec<_>>(), vec![1]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            sink.lines(),
            vec![
                "running 3 shutdown handlers...",
                "shutdown handler 0 succeeded",
                "shutdown handler 1 failed with: boom",
                "shutdown handler 2 succeeded",
            ]
        );
    }

    #[tokio::test]
    async fn test_handlers_see_trigger() {
        let handlers = ShutdownHandlers::new().add_named("check_trigger", |event| {
            let closed = matches!(event, LifecycleEvent::ListenerClosed);
            async move {
                if closed {
                    Ok(())
                } else {
                    Err(ShutdownError::new("unexpected trigger"))
                }
            }
        });

        let sink = MemorySink::new();
        let report = handlers.run(&LifecycleEvent::ListenerClosed, &sink).await;
        assert_eq!(report.exit_code(), 0);
        assert_eq!(handlers.names(), vec!["check_trigger"]);
    }

    #[tokio::test]
    async fn test_empty_handlers_report() {
        let sink = MemorySink::new();
        let report = ShutdownHandlers::new()
            .run(&LifecycleEvent::ListenerClosed, &sink)
            .await;
        assert!(report.outcomes().is_empty());
        assert_eq!(report.exit_code(), 0);
        assert!(sink.contains("running 0 shutdown handlers..."));
    }
}
