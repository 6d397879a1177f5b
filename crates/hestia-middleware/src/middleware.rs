//! Core middleware and handler traits.
//!
//! A [`Middleware`] wraps everything after it in the chain. It receives the
//! mutable context, the request, and a [`Next`] that runs the rest of the
//! chain. A middleware may short-circuit by returning its own response
//! without calling `next`.
//!
//! A [`Handler`] is the terminal point of a chain.
//!
//! # Example
//!
//! ```
//! use hestia_middleware::{BoxFuture, Middleware, MiddlewareContext, Next, Request, Response};
//!
//! struct ServerHeader;
//!
//! impl Middleware for ServerHeader {
//!     fn name(&self) -> &'static str {
//!         "server_header"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             let mut response = next.run(ctx, request).await;
//!             response
//!                 .headers_mut()
//!                 .insert("server", http::HeaderValue::from_static("hestia"));
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::types::{Request, Response};
use std::future::Future;

pub use hestia_core::BoxFuture;

/// A request-wrapping stage.
///
/// # Invariants
///
/// - Middleware MUST call `next.run()` at most once
/// - Middleware SHOULD NOT swallow the downstream response
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and debugging.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The terminal request handler of a chain.
pub trait Handler: Send + Sync + 'static {
    /// Produces the response for a request.
    fn call<'a>(&'a self, ctx: &'a mut MiddlewareContext, request: Request)
        -> BoxFuture<'a, Response>;
}

/// Callback to invoke the rest of the chain.
///
/// Consumed by [`run`](Self::run), so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that runs `middleware` and then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next middleware or handler in the chain.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler.call(ctx, request).await,
        }
    }
}

/// A [`Handler`] built from a closure.
///
/// The closure sees the context by shared reference and must copy out what
/// its future needs.
///
/// ```
/// use hestia_middleware::{handler_fn, Response, ResponseExt};
/// use http::StatusCode;
///
/// let hello = handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "hello") });
/// ```
pub struct HandlerFn<F> {
    func: F,
}

/// Wraps a closure as a [`Handler`].
pub const fn handler_fn<F, Fut>(func: F) -> HandlerFn<F>
where
    F: Fn(&MiddlewareContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    HandlerFn { func }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(&MiddlewareContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin((self.func)(ctx, request))
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}
