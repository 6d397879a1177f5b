//! Built-in middleware stages.
//!
//! The server composes them outermost first:
//!
//! 1. [`cors`] - CORS negotiation, may answer preflights directly
//! 2. [`request_logger`] - access line and request metrics
//! 3. [`request_id`] - assigns the request identifier
//!
//! User middlewares run inside these, closest to the router.

pub mod cors;
pub mod request_id;
pub mod request_logger;

pub use cors::{canonical_header_key, CorsConfig, CorsMiddleware};
pub use request_id::RequestIdMiddleware;
pub use request_logger::RequestLoggerMiddleware;
