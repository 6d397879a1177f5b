//! Request identifier middleware.
//!
//! Every request gets a fresh random identifier (UUID v4). It is stored in
//! the [`MiddlewareContext`] before the rest of the chain runs, so the
//! request logger and handlers can read it, and it is echoed to the client
//! in a response header (`X-Request-ID` unless configured otherwise).
//!
//! Incoming identifier headers are ignored.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use hestia_core::RequestId;
use http::header::{HeaderName, InvalidHeaderName};
use http::HeaderValue;

/// The default header name for the request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that assigns a request identifier.
///
/// # Example
///
/// ```
/// use hestia_middleware::stages::RequestIdMiddleware;
///
/// let default = RequestIdMiddleware::new();
/// assert_eq!(default.header().as_str(), "x-request-id");
///
/// let custom = RequestIdMiddleware::with_header("X-Correlation-ID").unwrap();
/// assert_eq!(custom.header().as_str(), "x-correlation-id");
/// ```
#[derive(Debug, Clone)]
pub struct RequestIdMiddleware {
    header: HeaderName,
}

impl Default for RequestIdMiddleware {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(REQUEST_ID_HEADER),
        }
    }
}

impl RequestIdMiddleware {
    /// Creates the middleware with the `X-Request-ID` header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the middleware with a custom response header name. An empty
    /// name falls back to `X-Request-ID`.
    ///
    /// # Errors
    ///
    /// Returns an error if `header` is not a valid header name.
    pub fn with_header(header: &str) -> Result<Self, InvalidHeaderName> {
        if header.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            header: HeaderName::from_bytes(header.as_bytes())?,
        })
    }

    /// Returns the response header name.
    #[must_use]
    pub const fn header(&self) -> &HeaderName {
        &self.header
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let request_id = RequestId::new();
            ctx.set_request_id(request_id);

            let mut response = next.run(ctx, request).await;

            // A hyphenated UUID is always a valid header value.
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(self.header.clone(), value);
            }
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use crate::types::ResponseExt;
    use bytes::Bytes;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;

    fn request_claiming(request_id: &str) -> Request {
        HttpRequest::builder()
            .uri("/test")
            .header(REQUEST_ID_HEADER, request_id)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    /// Echoes the context's request ID in the body.
    fn echo_handler() -> impl crate::middleware::Handler {
        handler_fn(|ctx, _req| {
            let id = ctx.request_id().map(|id| id.to_string()).unwrap_or_default();
            async move { Response::text(StatusCode::OK, id) }
        })
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let middleware = RequestIdMiddleware::new();
        let handler = echo_handler();
        let mut ctx = MiddlewareContext::new();

        let response = middleware
            .process(&mut ctx, request_claiming("ignored"), Next::handler(&handler))
            .await;

        let echoed: RequestId = response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(ctx.request_id(), Some(echoed));
    }

    #[tokio::test]
    async fn test_each_request_gets_a_new_id() {
        let middleware = RequestIdMiddleware::new();
        let handler = echo_handler();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut ctx = MiddlewareContext::new();
            middleware
                .process(&mut ctx, request_claiming("x"), Next::handler(&handler))
                .await;
            ids.push(ctx.request_id().unwrap());
        }
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[tokio::test]
    async fn test_custom_header() {
        let middleware = RequestIdMiddleware::with_header("X-Correlation-ID").unwrap();
        let handler = echo_handler();
        let mut ctx = MiddlewareContext::new();

        let response = middleware
            .process(&mut ctx, request_claiming("x"), Next::handler(&handler))
            .await;

        assert!(response.headers().contains_key("x-correlation-id"));
        assert!(!response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn test_empty_header_uses_default() {
        let middleware = RequestIdMiddleware::with_header("").unwrap();
        assert_eq!(middleware.header().as_str(), REQUEST_ID_HEADER);
    }

    #[test]
    fn test_invalid_header_rejected() {
        assert!(RequestIdMiddleware::with_header("bad header").is_err());
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(RequestIdMiddleware::new().name(), "request_id");
    }
}
