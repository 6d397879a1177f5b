//! # Hestia Core
//!
//! Core types shared by every Hestia crate.
//!
//! - [`RequestId`] - UUID v4 identifier attached to each request
//! - [`LogSink`] - pluggable line logger used for server events and access lines
//! - [`BoxFuture`] / [`BoxError`] - type-erased aliases used at trait seams

#![doc(html_root_url = "https://docs.rs/hestia-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod log;
mod request_id;

pub use log::{FnSink, LogSink, MemorySink, SharedSink, SinkKind, TracingSink};
pub use request_id::RequestId;

use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed, thread-safe error used as the `source` of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
