//! Lifecycle events and states.

use crate::signals::Signal;
use hestia_config::UnclassifiedErrorPolicy;
use std::fmt;

/// Outcome reported by the serve activity or the signal watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The listener was closed and the serve activity ended normally.
    ListenerClosed,
    /// A termination signal arrived.
    Signal(Signal),
    /// The configured address is taken.
    AddressInUse {
        /// The configured address.
        addr: String,
    },
    /// Any other server error.
    Unclassified(String),
}

impl LifecycleEvent {
    /// Returns whether this event ends the run under `policy`.
    #[must_use]
    pub const fn is_terminal(&self, policy: UnclassifiedErrorPolicy) -> bool {
        match self {
            Self::ListenerClosed | Self::Signal(_) | Self::AddressInUse { .. } => true,
            Self::Unclassified(_) => matches!(policy, UnclassifiedErrorPolicy::Shutdown),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListenerClosed => f.write_str("server closed"),
            Self::Signal(signal) => write!(f, "received signal: {signal}"),
            Self::AddressInUse { addr } => write!(f, "'{addr}' is already in use"),
            Self::Unclassified(message) => f.write_str(message),
        }
    }
}

/// State of a [`Server`](crate::Server).
///
/// ```text
/// Idle → Starting → Running → ShuttingDown → Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServerState {
    /// `start()` has not been called.
    Idle,
    /// Channels are set up, the listener is binding.
    Starting,
    /// The listener accepts connections.
    Running,
    /// A terminal event is being handled.
    ShuttingDown,
    /// `start()` has returned or is about to.
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        let cont = UnclassifiedErrorPolicy::Continue;
        let stop = UnclassifiedErrorPolicy::Shutdown;

        assert!(LifecycleEvent::ListenerClosed.is_terminal(cont));
        assert!(LifecycleEvent::Signal(Signal::Terminate).is_terminal(cont));
        assert!(LifecycleEvent::AddressInUse { addr: "x".into() }.is_terminal(cont));

        let unknown = LifecycleEvent::Unclassified("accept failed".into());
        assert!(!unknown.is_terminal(cont));
        assert!(unknown.is_terminal(stop));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            LifecycleEvent::Signal(Signal::Interrupt).to_string(),
            "received signal: SIGINT"
        );
        assert_eq!(
            LifecycleEvent::AddressInUse { addr: "0.0.0.0:8000".into() }.to_string(),
            "'0.0.0.0:8000' is already in use"
        );
    }

    #[test]
    fn test_state_order() {
        assert!(ServerState::Idle < ServerState::Starting);
        assert!(ServerState::Running < ServerState::ShuttingDown);
        assert!(ServerState::ShuttingDown < ServerState::Stopped);
        assert_eq!(ServerState::ShuttingDown.to_string(), "shutting_down");
    }
}
