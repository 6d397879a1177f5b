//! Telemetry setup failures.

use thiserror::Error;

/// Why logging could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directives could not be parsed.
    #[error("log filter '{filter}' rejected: {reason}")]
    InvalidFilter {
        /// Directives as given.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// Another global subscriber was installed first.
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = TelemetryError::InvalidFilter {
            filter: "hestia=loud".into(),
            reason: "invalid level".into(),
        };
        assert_eq!(err.to_string(), "log filter 'hestia=loud' rejected: invalid level");

        let err = TelemetryError::AlreadyInstalled("set".into());
        assert!(err.to_string().starts_with("a global tracing subscriber"));
    }
}
