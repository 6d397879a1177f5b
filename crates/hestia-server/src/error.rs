//! Error types for server construction and the running lifecycle.

use hestia_config::ConfigError;
use hestia_core::BoxError;
use http::header::InvalidHeaderName;
use std::io;
use thiserror::Error;

/// Errors returned while building a [`Server`](crate::Server).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The option set failed validation.
    #[error("invalid server options: {0}")]
    Config(#[from] ConfigError),

    /// A built-in or user route could not be registered.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// The request identifier header name is not a valid header name.
    #[error("invalid request identifier header '{header}': {source}")]
    RequestIdHeader {
        /// The configured name.
        header: String,
        /// Parse failure.
        #[source]
        source: InvalidHeaderName,
    },
}

/// Errors raised when registering routes on a [`Mux`](crate::Mux).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// The same method and path were registered twice.
    #[error("route '{method} {path}' is already registered")]
    Duplicate {
        /// Method of the conflicting route, `*` for any method.
        method: String,
        /// Path pattern of the conflicting route.
        path: String,
    },

    /// The path pattern does not start with `/`.
    #[error("invalid route path '{0}': must start with '/'")]
    InvalidPath(String),
}

/// Failure reported by a shutdown handler.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ShutdownError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ShutdownError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping a source error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by a liveness or readiness check.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ProbeError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping a source error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from a [`SignalWatcher`](crate::SignalWatcher).
#[derive(Debug, Error)]
pub enum SignalError {
    /// The OS refused the signal registration.
    #[error("failed to register {signal} handler: {source}")]
    Register {
        /// Signal name.
        signal: &'static str,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The watcher can no longer deliver signals.
    #[error("signal watcher closed")]
    Closed,
}

/// Errors produced by the serve activity.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Another socket is bound to the address.
    #[error("'{addr}' is already in use")]
    AddressInUse {
        /// The configured address.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Binding failed for another reason.
    #[error("failed to bind '{addr}': {source}")]
    Bind {
        /// The configured address.
        addr: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Accepting a connection failed.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

impl ServeError {
    /// Classifies a bind failure.
    #[must_use]
    pub fn from_bind(addr: impl Into<String>, source: io::Error) -> Self {
        let addr = addr.into();
        if source.kind() == io::ErrorKind::AddrInUse {
            Self::AddressInUse { addr, source }
        } else {
            Self::Bind { addr, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_route_error_display() {
        let err = RouteError::Duplicate {
            method: "GET".to_string(),
            path: "/healthz".to_string(),
        };
        assert_eq!(err.to_string(), "route 'GET /healthz' is already registered");
    }

    #[test]
    fn test_shutdown_error_source() {
        let err = ShutdownError::with_source("flush failed", io::Error::other("disk full"));
        assert_eq!(err.to_string(), "flush failed");
        assert_eq!(err.source().unwrap().to_string(), "disk full");
        assert!(ShutdownError::new("plain").source().is_none());
    }

    #[test]
    fn test_probe_error_message() {
        let err = ProbeError::new("database unreachable");
        assert_eq!(err.message(), "database unreachable");
    }

    #[test]
    fn test_serve_error_classifies_addr_in_use() {
        let err = ServeError::from_bind(
            "127.0.0.1:8000",
            io::Error::from(io::ErrorKind::AddrInUse),
        );
        assert!(matches!(err, ServeError::AddressInUse { .. }));
        assert_eq!(err.to_string(), "'127.0.0.1:8000' is already in use");

        let err = ServeError::from_bind(
            "127.0.0.1:80",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, ServeError::Bind { .. }));
    }

    #[test]
    fn test_server_error_from_config() {
        let err: ServerError = ConfigError::conflict("bad").into();
        assert!(err.to_string().starts_with("invalid server options"));
    }
}
