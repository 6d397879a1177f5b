//! Route multiplexer.
//!
//! [`Mux`] maps a method and path to a [`Handler`]. Patterns use
//! `{name}` segments for parameters, which are handed to the handler as
//! [`PathParams`] in the request context.
//!
//! When several patterns match a path, the one with the most literal
//! segments wins; ties go to the route registered first. A path that
//! matches only routes of other methods yields `405 Method Not Allowed`
//! with an `Allow` header, and an unknown path yields `404 Not Found`.
//!
//! Paths are compared segment by segment without normalisation: a trailing
//! or doubled `/` is part of the path, and a parameter never captures an
//! empty segment.
//!
//! # Example
//!
//! ```rust
//! use hestia_middleware::{handler_fn, Response, ResponseExt};
//! use hestia_server::Mux;
//! use http::{Method, StatusCode};
//!
//! let mut mux = Mux::new();
//! mux.route(
//!     Method::GET,
//!     "/items/{id}",
//!     handler_fn(|_ctx, _req| async { Response::text(StatusCode::OK, "item") }),
//! )
//! .unwrap();
//!
//! assert!(mux.matches(&Method::GET, "/items/42"));
//! assert!(!mux.matches(&Method::GET, "/items"));
//! ```

use crate::error::RouteError;
use hestia_core::BoxFuture;
use hestia_middleware::{Handler, MiddlewareContext, Request, Response, ResponseExt};
use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Path parameters extracted from the matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Returns a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no parameter was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    /// Same position in the path space, whatever the parameter names.
    fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Param(_), Self::Param(_)) => true,
            _ => false,
        }
    }
}

/// Splits a path after its leading `/`. Empty segments are kept, so
/// `/healthz/` and `//healthz` differ from `/healthz`; `/` has no segments.
fn split_path(path: &str) -> Vec<&str> {
    match path.strip_prefix('/').unwrap_or(path) {
        "" => Vec::new(),
        rest => rest.split('/').collect(),
    }
}

fn parse_segments(pattern: &str) -> Vec<Segment> {
    split_path(pattern)
        .into_iter()
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

struct Route {
    /// `None` matches any method.
    method: Option<Method>,
    pattern: String,
    segments: Vec<Segment>,
    handler: Arc<dyn Handler>,
}

impl Route {
    fn method_label(&self) -> String {
        self.method
            .as_ref()
            .map_or_else(|| "*".to_string(), ToString::to_string)
    }

    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
    }

    fn same_pattern(&self, segments: &[Segment]) -> bool {
        self.segments.len() == segments.len()
            && self.segments.iter().zip(segments).all(|(a, b)| a.overlaps(b))
    }

    /// Returns the captured parameters and the literal segment count.
    fn match_path(&self, path: &[&str]) -> Option<(PathParams, usize)> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        let mut literals = 0;
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                    literals += 1;
                }
                Segment::Param(_) if actual.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some((PathParams(params), literals))
    }
}

/// Outcome of looking up a request.
enum Resolution<'a> {
    Found(&'a Route, PathParams),
    MethodNotAllowed(Vec<String>),
    NotFound,
}

/// HTTP request multiplexer.
#[derive(Default)]
pub struct Mux {
    routes: Vec<Route>,
}

impl fmt::Debug for Mux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux").field("routes", &self.routes()).finish()
    }
}

impl Mux {
    /// Creates an empty multiplexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` requests on `pattern`.
    pub fn route<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<&mut Self, RouteError> {
        self.insert(Some(method), pattern, Arc::new(handler))
    }

    /// Registers `handler` for every method on `pattern`.
    pub fn any<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.insert(None, pattern, Arc::new(handler))
    }

    /// Registers an already shared handler. `None` matches any method.
    pub fn route_shared(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RouteError> {
        self.insert(method, pattern, handler)
    }

    fn insert(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RouteError> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPath(pattern.to_string()));
        }

        let segments = parse_segments(pattern);
        let duplicate = self
            .routes
            .iter()
            .any(|r| r.method == method && r.same_pattern(&segments));
        if duplicate {
            return Err(RouteError::Duplicate {
                method: method.map_or_else(|| "*".to_string(), |m| m.to_string()),
                path: pattern.to_string(),
            });
        }

        tracing::debug!(
            method = %method.as_ref().map_or("*", Method::as_str),
            pattern,
            "Registered route"
        );
        self.routes.push(Route {
            method,
            pattern: pattern.to_string(),
            segments,
            handler,
        });
        Ok(self)
    }

    /// Returns `(method, pattern)` for every route in registration order.
    /// Any-method routes report `*`.
    #[must_use]
    pub fn routes(&self) -> Vec<(String, &str)> {
        self.routes
            .iter()
            .map(|r| (r.method_label(), r.pattern.as_str()))
            .collect()
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns whether a request would reach a handler.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        matches!(self.resolve(method, path), Resolution::Found(..))
    }

    fn resolve(&self, method: &Method, path: &str) -> Resolution<'_> {
        let parts = split_path(path);

        let mut best: Option<(&Route, PathParams, usize)> = None;
        let mut allowed = Vec::new();
        for route in &self.routes {
            let Some((params, literals)) = route.match_path(&parts) else {
                continue;
            };
            if !route.accepts(method) {
                allowed.push(route.method_label());
                continue;
            }
            if best.as_ref().map_or(true, |(_, _, score)| literals > *score) {
                best = Some((route, params, literals));
            }
        }

        match best {
            Some((route, params, _)) => Resolution::Found(route, params),
            None if !allowed.is_empty() => {
                allowed.dedup();
                Resolution::MethodNotAllowed(allowed)
            }
            None => Resolution::NotFound,
        }
    }
}

impl Handler for Mux {
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            match self.resolve(request.method(), request.uri().path()) {
                Resolution::Found(route, params) => {
                    ctx.set_extension(params);
                    route.handler.call(ctx, request).await
                }
                Resolution::MethodNotAllowed(allowed) => {
                    let mut response =
                        Response::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
                    if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                        response.headers_mut().insert(ALLOW, value);
                    }
                    response
                }
                Resolution::NotFound => Response::error(StatusCode::NOT_FOUND, "not found"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hestia_middleware::handler_fn;
    use http_body_util::{BodyExt, Full};

    fn named(name: &'static str) -> impl Handler {
        handler_fn(move |ctx, _req| {
            let id = ctx
                .get_extension::<PathParams>()
                .and_then(|p| p.get("id"))
                .unwrap_or_default()
                .to_string();
            async move { Response::text(StatusCode::OK, format!("{name}:{id}")) }
        })
    }

    async fn send(mux: &Mux, method: Method, path: &str) -> (StatusCode, String, Option<String>) {
        let request = http::Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut ctx = MiddlewareContext::new();
        let response = mux.call(&mut ctx, request).await;
        let status = response.status();
        let allow = response
            .headers()
            .get(ALLOW)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap(), allow)
    }

    #[tokio::test]
    async fn test_dispatch_with_params() {
        let mut mux = Mux::new();
        mux.route(Method::GET, "/items/{id}", named("get")).unwrap();
        mux.route(Method::DELETE, "/items/{id}", named("delete")).unwrap();

        let (status, body, _) = send(&mux, Method::GET, "/items/42?full=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "get:42");

        let (_, body, _) = send(&mux, Method::DELETE, "/items/7").await;
        assert_eq!(body, "delete:7");
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let mut mux = Mux::new();
        mux.route(Method::GET, "/healthz", named("live")).unwrap();
        mux.route(Method::HEAD, "/healthz", named("live-head")).unwrap();

        let (status, _, _) = send(&mux, Method::GET, "/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, allow) = send(&mux, Method::POST, "/healthz").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(allow.as_deref(), Some("GET, HEAD"));
    }

    #[tokio::test]
    async fn test_literal_beats_param() {
        let mut mux = Mux::new();
        mux.any("/{page}", named("page")).unwrap();
        mux.route(Method::GET, "/version", named("version")).unwrap();

        let (_, body, _) = send(&mux, Method::GET, "/version").await;
        assert_eq!(body, "version:");

        let (_, body, _) = send(&mux, Method::PUT, "/version").await;
        assert_eq!(body, "page:");
    }

    #[tokio::test]
    async fn test_any_method_route() {
        let mut mux = Mux::new();
        mux.any("/echo", named("echo")).unwrap();

        for method in [Method::GET, Method::POST, Method::OPTIONS] {
            let (status, _, _) = send(&mux, method, "/echo").await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_paths_match_exactly() {
        let mut mux = Mux::new();
        mux.route(Method::GET, "/healthz", named("live")).unwrap();
        mux.route(Method::GET, "/items/{id}", named("item")).unwrap();
        mux.route(Method::GET, "/", named("root")).unwrap();

        for path in ["/healthz/", "/healthz//", "/items/", "/items//"] {
            let (status, _, _) = send(&mux, Method::GET, path).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        }

        let (status, _, _) = send(&mux, Method::GET, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        let (_, body, _) = send(&mux, Method::GET, "/").await;
        assert_eq!(body, "root:");
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("/a/b"), vec!["a", "b"]);
        assert_eq!(split_path("/a/"), vec!["a", ""]);
        assert_eq!(split_path("//a"), vec!["", "a"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut mux = Mux::new();
        mux.route(Method::GET, "/items/{id}", named("a")).unwrap();

        let err = mux
            .route(Method::GET, "/items/{item}", named("b"))
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                method: "GET".to_string(),
                path: "/items/{item}".to_string(),
            }
        );

        mux.route(Method::POST, "/items/{id}", named("c")).unwrap();
        mux.any("/items/{id}", named("d")).unwrap();
        assert!(mux.any("/items/{x}", named("e")).is_err());
        assert_eq!(mux.len(), 3);
    }

    #[test]
    fn test_invalid_path_rejected() {
        let mut mux = Mux::new();
        let err = mux.any("healthz", named("a")).unwrap_err();
        assert_eq!(err, RouteError::InvalidPath("healthz".to_string()));
        assert!(mux.is_empty());
    }

    #[test]
    fn test_routes_listing() {
        let mut mux = Mux::new();
        mux.route(Method::GET, "/a", named("a"))
            .unwrap()
            .any("/b", named("b"))
            .unwrap();

        assert_eq!(
            mux.routes(),
            vec![("GET".to_string(), "/a"), ("*".to_string(), "/b")]
        );
    }
}
