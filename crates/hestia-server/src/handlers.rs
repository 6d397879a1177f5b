//! Version and metrics endpoints.

use hestia_core::BoxFuture;
use hestia_middleware::{Handler, MiddlewareContext, Request, Response, ResponseExt};
use hestia_telemetry::MetricsRegistry;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Serves the configured version string as `text/plain`.
#[derive(Debug, Clone)]
pub struct VersionEndpoint {
    version: String,
}

impl VersionEndpoint {
    /// Creates the endpoint.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Returns the served version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Handler for VersionEndpoint {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        _request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move { Response::text(StatusCode::OK, self.version.clone()) })
    }
}

/// Renders a [`MetricsRegistry`] in Prometheus text format.
#[derive(Debug, Clone)]
pub struct MetricsEndpoint {
    registry: MetricsRegistry,
}

impl Default for MetricsEndpoint {
    fn default() -> Self {
        Self::new(MetricsRegistry::global())
    }
}

impl MetricsEndpoint {
    /// Creates the endpoint over `registry`.
    #[must_use]
    pub fn new(registry: MetricsRegistry) -> Self {
        Self { registry }
    }
}

impl Handler for MetricsEndpoint {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        _request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = Response::text(StatusCode::OK, self.registry.render());
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE));
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    fn get(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_version_endpoint() {
        let endpoint = VersionEndpoint::new("1.4.2");
        let mut ctx = MiddlewareContext::new();

        let response = endpoint.call(&mut ctx, get("/version")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"1.4.2");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_renders_recorded_requests() {
        let registry = MetricsRegistry::new();
        registry.record_request("GET", 200, std::time::Duration::from_millis(3));

        let endpoint = MetricsEndpoint::new(registry);
        let mut ctx = MiddlewareContext::new();
        let response = endpoint.call(&mut ctx, get("/metrics")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], PROMETHEUS_CONTENT_TYPE);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("hestia_http_requests_total"));
    }
}
