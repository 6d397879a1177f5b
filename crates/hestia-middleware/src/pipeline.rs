//! Ordered middleware composition.
//!
//! A [`Pipeline`] turns `[m1, m2, ..., mn]` plus a terminal handler `h` into
//! a single handler equivalent to `m1(m2(...mn(h)...))`: the first stage sees
//! the request first and the response last.
//!
//! ```text
//! Request  → m1 → m2 → ... → mn → handler
//! Response ← m1 ← m2 ← ... ← mn ←───┘
//! ```

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Handler, Middleware, Next};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, ordered middleware chain around a terminal handler.
///
/// # Example
///
/// ```
/// use hestia_middleware::{handler_fn, Pipeline, Response, ResponseExt};
/// use hestia_middleware::stages::RequestIdMiddleware;
/// use http::StatusCode;
///
/// let pipeline = Pipeline::builder()
///     .add_stage(RequestIdMiddleware::new())
///     .build(handler_fn(|_ctx, _req| async { Response::empty(StatusCode::OK) }));
///
/// assert_eq!(pipeline.stage_names(), vec!["request_id"]);
/// ```
pub struct Pipeline {
    /// Stages, outermost first.
    stages: Vec<BoxedMiddleware>,

    /// Terminal handler.
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through every stage and the handler.
    pub async fn process(&self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        self.build_chain().run(ctx, request).await
    }

    /// Builds the chain from back to front.
    fn build_chain(&self) -> Next<'_> {
        let mut next = Next::handler(self.handler.as_ref());
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all middleware stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of middleware stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl Handler for Pipeline {
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(self.process(ctx, request))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Stages added first run outermost.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn add_shared_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Appends several shared stages in order.
    #[must_use]
    pub fn add_stages<I>(mut self, middlewares: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        self.stages.extend(middlewares);
        self
    }

    /// Closes the chain with the terminal handler.
    #[must_use]
    pub fn build<H: Handler>(self, handler: H) -> Pipeline {
        self.build_shared(Arc::new(handler))
    }

    /// Closes the chain with an already shared handler.
    #[must_use]
    pub fn build_shared(self, handler: Arc<dyn Handler>) -> Pipeline {
        Pipeline {
            stages: self.stages,
            handler,
        }
    }
}
