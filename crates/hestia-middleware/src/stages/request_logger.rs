//! Access-log middleware.
//!
//! Writes one line per request to a [`LogSink`] once the response is known:
//!
//! ```text
//! 10.0.0.7:51234 - alice [7/Mar/2026:14:02:11 +0000] "GET /items?page=2 HTTP/1.1" 200 512 "-" "curl/8.5.0" rt=1.204 id=6f1c...
//! ```
//!
//! Fields are remote address, user name of a Basic `Authorization` header,
//! UTC timestamp, request line, status, body length, referer, user agent,
//! response time in milliseconds and the request identifier. Empty fields
//! render as `-`.
//!
//! Given a [`MetricsRegistry`] the stage also records the request count and
//! latency into it.

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hestia_core::{LogSink, SharedSink, TracingSink};
use hestia_telemetry::MetricsRegistry;
use http::header::{AUTHORIZATION, REFERER, USER_AGENT};
use http::HeaderMap;
use hyper::body::Body;
use std::sync::Arc;
use std::time::Duration;

/// Timestamp layout of the access line.
pub const TIMESTAMP_FORMAT: &str = "%-d/%b/%Y:%H:%M:%S %z";

/// Middleware that writes an access line per request.
#[derive(Clone)]
pub struct RequestLoggerMiddleware {
    sink: SharedSink,
    metrics: Option<MetricsRegistry>,
}

impl Default for RequestLoggerMiddleware {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink::access()))
    }
}

impl std::fmt::Debug for RequestLoggerMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLoggerMiddleware")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl RequestLoggerMiddleware {
    /// Creates the middleware writing to `sink`.
    #[must_use]
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            metrics: None,
        }
    }

    /// Also records every request into `registry`.
    #[must_use]
    pub fn with_metrics(mut self, registry: MetricsRegistry) -> Self {
        self.metrics = Some(registry);
        self
    }
}

/// Request fields captured before the request is handed on.
struct RequestLine {
    method: String,
    uri: String,
    proto: String,
    user: String,
    referer: String,
    user_agent: String,
}

impl RequestLine {
    fn capture(request: &Request) -> Self {
        let headers = request.headers();
        Self {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            proto: format!("{:?}", request.version()),
            user: basic_auth_user(headers).unwrap_or_default(),
            referer: header_string(headers, REFERER),
            user_agent: header_string(headers, USER_AGENT),
        }
    }
}

impl Middleware for RequestLoggerMiddleware {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let line = RequestLine::capture(&request);
            let started = std::time::Instant::now();

            let response = next.run(ctx, request).await;

            let elapsed = started.elapsed();
            let status = response.status().as_u16();
            let length = response.body().size_hint().exact().unwrap_or(0);
            let remote = ctx
                .remote_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_default();
            let id = ctx
                .request_id()
                .map(|id| id.to_string())
                .unwrap_or_default();

            self.sink.log(&format!(
                "{} - {} [{}] \"{} {} {}\" {} {} \"{}\" \"{}\" rt={} id={}",
                dash(&remote),
                dash(&line.user),
                chrono::Utc::now().format(TIMESTAMP_FORMAT),
                dash(&line.method),
                dash(&line.uri),
                dash(&line.proto),
                status,
                length,
                dash(&line.referer),
                dash(&line.user_agent),
                format_millis(elapsed),
                dash(&id),
            ));

            if let Some(registry) = &self.metrics {
                registry.record_request(&line.method, status, elapsed);
            }

            response
        })
    }
}

fn dash(field: &str) -> &str {
    if field.is_empty() {
        "-"
    } else {
        field
    }
}

/// Milliseconds with microsecond precision, e.g. `1.204`.
fn format_millis(elapsed: Duration) -> String {
    #[allow(clippy::cast_precision_loss)]
    let millis = elapsed.as_micros() as f64 / 1000.0;
    format!("{millis:.3}")
}

fn header_string(headers: &HeaderMap, name: http::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Extracts the user name from `Authorization: Basic <base64(user:pass)>`.
fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let user = credentials.split_once(':').map_or(credentials.as_str(), |(u, _)| u);
    Some(user.to_string())
}
