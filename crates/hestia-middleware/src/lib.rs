//! # Hestia Middleware
//!
//! Request pipeline for Hestia servers.
//!
//! A [`Pipeline`] composes [`Middleware`] stages around a terminal
//! [`Handler`]. The first stage added is the outermost: it sees the request
//! first and the response last. Each request carries a
//! [`MiddlewareContext`] with its identifier, peer address and typed
//! extensions.
//!
//! ## Built-in Stages
//!
//! | Stage | Purpose |
//! |-------|---------|
//! | [`stages::CorsMiddleware`] | CORS negotiation and preflight handling |
//! | [`stages::RequestLoggerMiddleware`] | Access line and request metrics |
//! | [`stages::RequestIdMiddleware`] | Per-request UUID v4 identifier |
//!
//! ## Example
//!
//! ```
//! use hestia_middleware::stages::{CorsConfig, CorsMiddleware, RequestIdMiddleware};
//! use hestia_middleware::{handler_fn, Pipeline, Response, ResponseExt};
//! use http::StatusCode;
//!
//! let pipeline = Pipeline::builder()
//!     .add_stage(CorsMiddleware::new(CorsConfig::default()))
//!     .add_stage(RequestIdMiddleware::new())
//!     .build(handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "hi") }));
//!
//! assert_eq!(pipeline.stage_names(), vec!["cors", "request_id"]);
//! ```

#![doc(html_root_url = "https://docs.rs/hestia-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use middleware::{handler_fn, BoxFuture, Handler, HandlerFn, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};
