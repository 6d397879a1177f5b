//! Pluggable line loggers.
//!
//! A Hestia server writes two kinds of lines: server events (start, stop,
//! signals, shutdown handler outcomes) and one access line per request.
//! Both go through a [`LogSink`] so embedders can redirect them.
//!
//! | Sink | Behaviour |
//! |------|-----------|
//! | [`TracingSink`] | Forwards to `tracing` at `info` level (default) |
//! | [`MemorySink`] | Buffers lines in memory |
//! | [`FnSink`] | Calls a user closure |

use parking_lot::Mutex;
use std::sync::Arc;

/// Destination for formatted log lines.
pub trait LogSink: Send + Sync + 'static {
    /// Writes one line.
    fn log(&self, message: &str);
}

/// Shared, type-erased sink.
pub type SharedSink = Arc<dyn LogSink>;

/// Which stream a [`TracingSink`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Lifecycle events, target `hestia::server`.
    Server,
    /// Request lines, target `hestia::access`.
    Access,
}

/// Sink that forwards each line to `tracing` as an `info` event.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    kind: SinkKind,
}

impl TracingSink {
    /// Sink for server lifecycle events.
    #[must_use]
    pub const fn server() -> Self {
        Self {
            kind: SinkKind::Server,
        }
    }

    /// Sink for request access lines.
    #[must_use]
    pub const fn access() -> Self {
        Self {
            kind: SinkKind::Access,
        }
    }

    /// Returns the stream this sink writes to.
    #[must_use]
    pub const fn kind(&self) -> SinkKind {
        self.kind
    }
}

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        match self.kind {
            SinkKind::Server => tracing::info!(target: "hestia::server", "{message}"),
            SinkKind::Access => tracing::info!(target: "hestia::access", "{message}"),
        }
    }
}

/// Sink that keeps every line in memory.
///
/// Clones share the same buffer, so a clone can be handed to a server while
/// the original is kept for inspection.
///
/// # Example
///
/// ```
/// use hestia_core::{LogSink, MemorySink};
///
/// let sink = MemorySink::new();
/// sink.log("server was closed");
/// assert!(sink.contains("closed"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the buffered lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns true if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    /// Returns the index of the first line containing `needle`.
    #[must_use]
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines.lock().iter().position(|line| line.contains(needle))
    }

    /// Drops every buffered line.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

/// Sink backed by a closure.
///
/// ```
/// use hestia_core::{FnSink, LogSink};
///
/// let sink = FnSink::new(|line: &str| eprintln!("{line}"));
/// sink.log("hello");
/// ```
pub struct FnSink<F> {
    func: F,
}

impl<F> FnSink<F>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> LogSink for FnSink<F>
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn log(&self, message: &str) {
        (self.func)(message);
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_memory_sink_shares_buffer_between_clones() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        clone.log("first");
        clone.log("second");

        assert_eq!(sink.lines(), vec!["first", "second"]);
        assert_eq!(sink.position("second"), Some(1));
        assert!(!sink.contains("third"));

        sink.clear();
        assert!(clone.lines().is_empty());
    }

    #[test]
    fn test_fn_sink_invokes_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sink = FnSink::new(move |_line: &str| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        sink.log("a");
        sink.log("b");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tracing_sink_kinds() {
        assert_eq!(TracingSink::server().kind(), SinkKind::Server);
        assert_eq!(TracingSink::access().kind(), SinkKind::Access);
        // No subscriber installed; logging must still be a no-op.
        TracingSink::server().log("ignored");
    }

    #[test]
    fn test_sinks_are_object_safe() {
        let sinks: Vec<SharedSink> = vec![
            Arc::new(TracingSink::server()),
            Arc::new(MemorySink::new()),
            Arc::new(FnSink::new(|_: &str| {})),
        ];
        for sink in &sinks {
            sink.log("line");
        }
    }
}
