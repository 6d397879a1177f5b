//! Per-request state shared by pipeline stages.

use hestia_core::RequestId;
use http::Extensions;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Per-request scratch space handed to every [`Middleware`](crate::Middleware)
/// and to the final [`Handler`](crate::Handler).
///
/// The server builds one per accepted request. The request identifier stage
/// fills in [`request_id`](Self::request_id) and the router stores the
/// matched `PathParams` as an extension. Values written on the way in are
/// still there on the way out, which is how the request logger reports the
/// identifier after the handler returned.
///
/// ```
/// use hestia_middleware::context::MiddlewareContext;
/// use hestia_core::RequestId;
///
/// let mut ctx = MiddlewareContext::new();
/// assert!(ctx.request_id().is_none());
///
/// ctx.set_request_id(RequestId::new());
/// assert!(ctx.request_id().is_some());
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    received: Instant,
    peer: Option<SocketAddr>,
    request_id: Option<RequestId>,
    extensions: Extensions,
}

impl MiddlewareContext {
    /// A context with no peer, no identifier and no extensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            received: Instant::now(),
            peer: None,
            request_id: None,
            extensions: Extensions::new(),
        }
    }

    /// A context for a request read from `peer`.
    #[must_use]
    pub fn with_remote_addr(peer: SocketAddr) -> Self {
        let mut ctx = Self::new();
        ctx.peer = Some(peer);
        ctx
    }

    /// Identifier of this request, once the identifier stage has run.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Records the identifier of this request.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = Some(request_id);
    }

    /// Address of the connected client.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Time since the server handed the request to the pipeline.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.received.elapsed()
    }

    /// Stores `value`, replacing an earlier value of the same type.
    ///
    /// ```
    /// use hestia_middleware::context::MiddlewareContext;
    ///
    /// #[derive(Clone)]
    /// struct Tenant(&'static str);
    ///
    /// let mut ctx = MiddlewareContext::new();
    /// ctx.set_extension(Tenant("acme"));
    /// assert_eq!(ctx.get_extension::<Tenant>().unwrap().0, "acme");
    /// ```
    pub fn set_extension<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(value);
    }

    /// The stored value of type `T`, if any.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// Removes the stored value of type `T` and hands it back.
    pub fn take_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
