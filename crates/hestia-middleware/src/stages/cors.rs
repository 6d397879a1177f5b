//! CORS (Cross-Origin Resource Sharing) negotiation.
//!
//! For every request the middleware decides which `Access-Control-*`
//! headers to emit and, for preflight requests, whether to answer
//! immediately instead of calling the wrapped handler.
//!
//! ## Negotiation
//!
//! 1. `Vary` lists each of `Access-Control-Request-Headers`,
//!    `Access-Control-Request-Method` and `Origin` that the request carried.
//! 2. An allowed `Origin` is echoed in `Access-Control-Allow-Origin`. A
//!    request without `Origin` is never rejected on origin grounds.
//! 3. The effective method is `Access-Control-Request-Method` when present,
//!    else the request method. An allowed method is echoed in
//!    `Access-Control-Allow-Methods`.
//! 4. Requested headers are trimmed and canonicalised (`x-custom-id` becomes
//!    `X-Custom-Id`). When every one is allowed they are listed in
//!    `Access-Control-Allow-Headers`.
//! 5. `Access-Control-Allow-Credentials: true` is sent whenever credentials
//!    are enabled, whatever the outcome.
//!
//! A preflight is an `OPTIONS` request carrying
//! `Access-Control-Request-Method`. It gets `Access-Control-Max-Age` and,
//! unless passthrough is enabled, an empty `204 No Content` on success or
//! `400 Bad Request` on failure.
//!
//! ## Example
//!
//! ```
//! use hestia_middleware::stages::{CorsConfig, CorsMiddleware};
//! use std::time::Duration;
//!
//! let cors = CorsMiddleware::new(
//!     CorsConfig::new()
//!         .allow_origins(["https://app.example.com"])
//!         .allow_methods(["GET", "POST", "OPTIONS"])
//!         .allow_headers(["content-type", "x-request-id"])
//!         .allow_credentials(true)
//!         .max_age(Duration::from_secs(600)),
//! );
//! assert!(cors.config().is_origin_allowed("https://app.example.com"));
//! ```

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response, ResponseExt};
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;

/// Default allowed origin.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default allowed methods.
pub const DEFAULT_ALLOWED_METHODS: [&str; 3] = ["GET", "OPTIONS", "POST"];

/// Default preflight cache duration.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// CORS negotiation settings.
///
/// Membership checks are exact, except header names which are compared in
/// canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    allowed_origins: HashSet<String>,
    allowed_methods: HashSet<String>,
    allowed_headers: HashSet<String>,
    expose_headers: Vec<String>,
    allow_credentials: bool,
    passthrough: bool,
    max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: HashSet::from([DEFAULT_ALLOWED_ORIGIN.to_string()]),
            allowed_methods: DEFAULT_ALLOWED_METHODS.iter().map(ToString::to_string).collect(),
            allowed_headers: HashSet::new(),
            expose_headers: Vec::new(),
            allow_credentials: false,
            passthrough: false,
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

impl CorsConfig {
    /// Creates a configuration with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the allowed origins.
    #[must_use]
    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the allowed methods. Methods are matched exactly as given.
    #[must_use]
    pub fn allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the allowed request headers.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_headers = headers
            .into_iter()
            .map(|h| canonical_header_key(h.as_ref().trim()))
            .collect();
        self
    }

    /// Replaces the headers exposed to scripts on actual requests.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether `Access-Control-Allow-Credentials: true` is sent.
    #[must_use]
    pub const fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Lets a successful or failed preflight continue to the wrapped handler.
    #[must_use]
    pub const fn passthrough(mut self, enabled: bool) -> Self {
        self.passthrough = enabled;
        self
    }

    /// Sets how long browsers may cache a preflight result. Zero omits the
    /// header.
    #[must_use]
    pub const fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Returns whether `origin` is in the allowed set.
    #[must_use]
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }

    /// Returns whether `method` is in the allowed set.
    #[must_use]
    pub fn is_method_allowed(&self, method: &str) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Returns whether the canonical form of `header` is allowed.
    #[must_use]
    pub fn is_header_allowed(&self, header: &str) -> bool {
        self.allowed_headers.contains(&canonical_header_key(header))
    }

    /// Returns whether passthrough is enabled.
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        self.passthrough
    }
}

/// Middleware that negotiates CORS for every request.
///
/// Runs outermost so a preflight can be answered before any other stage.
#[derive(Debug, Clone, Default)]
pub struct CorsMiddleware {
    config: CorsConfig,
}

/// Outcome of negotiating one request.
#[derive(Debug)]
struct Negotiation {
    /// Headers to add to the response.
    headers: HeaderMap,
    /// Set when the request must be answered without calling the handler.
    preflight_status: Option<StatusCode>,
}

impl CorsMiddleware {
    /// Creates the middleware from its configuration.
    #[must_use]
    pub const fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &CorsConfig {
        &self.config
    }

    fn negotiate(&self, request: &Request) -> Negotiation {
        let mut headers = HeaderMap::new();
        let incoming = request.headers();

        let requested_headers = incoming.get(ACCESS_CONTROL_REQUEST_HEADERS);
        if requested_headers.is_some() {
            headers.append(
                VARY,
                HeaderValue::from_static("Access-Control-Request-Headers"),
            );
        }
        let requested_method = incoming
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .filter(|v| !v.is_empty());
        if requested_method.is_some() {
            headers.append(
                VARY,
                HeaderValue::from_static("Access-Control-Request-Method"),
            );
        }
        let origin = incoming.get(ORIGIN).filter(|v| !v.is_empty());
        if origin.is_some() {
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }

        let origin_ok = match origin {
            None => true,
            Some(value) => {
                let allowed = self.config.is_origin_allowed(&header_text(value));
                if allowed {
                    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value.clone());
                }
                allowed
            }
        };

        let method_ok = match requested_method {
            Some(value) => {
                let allowed = self.config.is_method_allowed(&header_text(value));
                if allowed {
                    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value.clone());
                }
                allowed
            }
            None => {
                let method = request.method().as_str();
                let allowed = self.config.is_method_allowed(method);
                if allowed {
                    if let Ok(value) = HeaderValue::from_str(method) {
                        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
                    }
                }
                allowed
            }
        };

        let requested: Vec<String> = requested_headers
            .map(|value| {
                header_text(value)
                    .split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(canonical_header_key)
                    .collect()
            })
            .unwrap_or_default();
        let headers_ok = requested
            .iter()
            .all(|h| self.config.allowed_headers.contains(h));
        if headers_ok && !requested.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&requested.join(",")) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }

        if self.config.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        let success = origin_ok && method_ok && headers_ok;
        let is_preflight = request.method() == Method::OPTIONS && requested_method.is_some();
        let mut preflight_status = None;

        if is_preflight {
            let max_age = self.config.max_age.as_secs();
            if max_age > 0 {
                headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age));
            }
            if !self.config.passthrough {
                preflight_status = Some(if success {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::BAD_REQUEST
                });
            }
        }

        if preflight_status.is_none() && !self.config.expose_headers.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.config.expose_headers.join(",")) {
                headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
            }
        }

        Negotiation {
            headers,
            preflight_status,
        }
    }
}

impl Middleware for CorsMiddleware {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let negotiation = self.negotiate(&request);

            if let Some(status) = negotiation.preflight_status {
                let mut response = Response::empty(status);
                *response.headers_mut() = negotiation.headers;
                return response;
            }

            let mut response = next.run(ctx, request).await;
            let target = response.headers_mut();
            for (name, value) in &negotiation.headers {
                if name == VARY {
                    target.append(VARY, value.clone());
                } else {
                    target.entry(name).or_insert_with(|| value.clone());
                }
            }
            response
        })
    }
}

fn header_text(value: &HeaderValue) -> Cow<'_, str> {
    String::from_utf8_lossy(value.as_bytes())
}

/// Canonicalises a header name: the first letter and any letter after a
/// hyphen are upper-cased, the rest lower-cased. Names containing bytes that
/// are not valid token characters are returned unchanged.
#[must_use]
pub fn canonical_header_key(name: &str) -> String {
    if !name.bytes().all(is_token_byte) {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let mapped = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            mapped
        })
        .collect()
}

const fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::handler_fn;
    use bytes::Bytes;
    use http::Request as HttpRequest;
    use http_body_util::Full;
    use hyper::body::Body;

    const APP: &str = "https://app.example.com";

    fn config() -> CorsConfig {
        CorsConfig::new()
            .allow_origins([APP])
            .allow_methods(["GET", "POST"])
            .allow_headers(["content-type", "X-Request-ID"])
            .max_age(Duration::from_secs(600))
    }

    fn preflight(origin: &str, method: &str, headers: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/items")
            .header(ORIGIN, origin)
            .header(ACCESS_CONTROL_REQUEST_METHOD, method);
        if let Some(h) = headers {
            builder = builder.header(ACCESS_CONTROL_REQUEST_HEADERS, h);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn actual(method: Method, origin: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder().method(method).uri("/items");
        if let Some(origin) = origin {
            builder = builder.header(ORIGIN, origin);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    async fn run(cors: &CorsMiddleware, request: Request) -> Response {
        let handler = handler_fn(|_ctx, _req| async {
            let mut response = Response::text(StatusCode::OK, "handled");
            response
                .headers_mut()
                .insert(VARY, HeaderValue::from_static("Accept-Encoding"));
            response
        });
        let mut ctx = MiddlewareContext::new();
        cors.process(&mut ctx, request, Next::handler(&handler)).await
    }

    fn vary(response: &Response) -> Vec<&str> {
        response
            .headers()
            .get_all(VARY)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("content-type"), "Content-Type");
        assert_eq!(canonical_header_key("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(canonical_header_key("accept"), "Accept");
        assert_eq!(canonical_header_key("bad header"), "bad header");
        assert_eq!(canonical_header_key(""), "");
    }

    #[test]
    fn test_default_config() {
        let config = CorsConfig::default();
        assert!(config.is_origin_allowed("http://localhost:3000"));
        assert!(config.is_method_allowed("OPTIONS"));
        assert!(!config.is_method_allowed("DELETE"));
        assert!(!config.is_passthrough());
        assert_eq!(config.max_age, Duration::from_secs(1800));
    }

    #[test]
    fn test_header_membership_is_case_insensitive() {
        let config = config();
        assert!(config.is_header_allowed("CONTENT-TYPE"));
        assert!(config.is_header_allowed("x-request-id"));
        assert!(!config.is_header_allowed("x-other"));
    }

    #[tokio::test]
    async fn test_preflight_allowed() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, preflight(APP, "POST", Some("content-type, x-request-id"))).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.body().size_hint().exact(), Some(0));
        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), APP);
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "POST");
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Content-Type,X-Request-Id"
        );
        assert_eq!(headers.get(ACCESS_CONTROL_MAX_AGE).unwrap(), "600");
        assert_eq!(
            vary(&response),
            vec![
                "Access-Control-Request-Headers",
                "Access-Control-Request-Method",
                "Origin"
            ]
        );
    }

    #[tokio::test]
    async fn test_preflight_disallowed_origin() {
        let cors = CorsMiddleware::new(config().allow_credentials(true));
        let response = run(&cors, preflight("https://evil.example", "GET", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().size_hint().exact(), Some(0));
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_preflight_disallowed_method() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, preflight(APP, "DELETE", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), APP);
    }

    #[tokio::test]
    async fn test_preflight_disallowed_header() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, preflight(APP, "GET", Some("content-type,x-secret"))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
    }

    #[tokio::test]
    async fn test_preflight_empty_header_list_is_satisfied() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, preflight(APP, "GET", Some(" , "))).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
    }

    #[tokio::test]
    async fn test_preflight_without_origin_is_not_rejected() {
        let cors = CorsMiddleware::new(config());
        let request = HttpRequest::builder()
            .method(Method::OPTIONS)
            .uri("/items")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = run(&cors, request).await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(vary(&response), vec!["Access-Control-Request-Method"]);
    }

    #[tokio::test]
    async fn test_zero_max_age_is_omitted() {
        let cors = CorsMiddleware::new(config().max_age(Duration::ZERO));
        let response = run(&cors, preflight(APP, "GET", None)).await;

        assert!(response.headers().get(ACCESS_CONTROL_MAX_AGE).is_none());
    }

    #[tokio::test]
    async fn test_passthrough_reaches_handler() {
        let cors = CorsMiddleware::new(config().passthrough(true).expose_headers(["X-Trace"]));
        let response = run(&cors, preflight("https://evil.example", "GET", None)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(ACCESS_CONTROL_MAX_AGE).unwrap(), "600");
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
            "X-Trace"
        );
    }

    #[tokio::test]
    async fn test_actual_request_allowed_origin() {
        let cors = CorsMiddleware::new(config().expose_headers(["X-Request-ID", "X-Trace"]));
        let response = run(&cors, actual(Method::GET, Some(APP))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), APP);
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(), "GET");
        assert_eq!(
            headers.get(ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
            "X-Request-ID,X-Trace"
        );
        assert!(headers.get(ACCESS_CONTROL_MAX_AGE).is_none());
        assert_eq!(vary(&response), vec!["Accept-Encoding", "Origin"]);
    }

    #[tokio::test]
    async fn test_actual_request_disallowed_origin_still_handled() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, actual(Method::GET, Some("https://evil.example"))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_options_without_request_method_is_not_preflight() {
        let cors = CorsMiddleware::new(config());
        let response = run(&cors, actual(Method::OPTIONS, Some(APP))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[tokio::test]
    async fn test_handler_headers_take_precedence() {
        let cors = CorsMiddleware::new(config());
        let handler = handler_fn(|_ctx, _req| async {
            let mut response = Response::empty(StatusCode::OK);
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            response
        });
        let mut ctx = MiddlewareContext::new();
        let response = cors
            .process(&mut ctx, actual(Method::GET, Some(APP)), Next::handler(&handler))
            .await;

        assert_eq!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(CorsMiddleware::default().name(), "cors");
    }
}
