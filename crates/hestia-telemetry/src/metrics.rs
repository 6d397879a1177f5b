//! Prometheus metrics.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hestia_http_requests_total` | Counter | `method`, `status` | Total requests |
//! | `hestia_http_request_duration_seconds` | Histogram | `method` | Request latency |
//!
//! A [`MetricsRegistry`] is either the process-wide one from
//! [`MetricsRegistry::global`], which installs its recorder as the `metrics`
//! global recorder, or a standalone one from [`MetricsRegistry::new`] that
//! owns its recorder and only sees what is recorded through it.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Name of the request counter.
pub const REQUESTS_TOTAL: &str = "hestia_http_requests_total";

/// Name of the request duration histogram.
pub const REQUEST_DURATION_SECONDS: &str = "hestia_http_request_duration_seconds";

/// Buckets for request duration: 1ms up to 10s.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static GLOBAL: OnceLock<MetricsRegistry> = OnceLock::new();

/// A Prometheus registry: records request metrics and renders them in the
/// text exposition format.
#[derive(Clone)]
pub struct MetricsRegistry {
    /// `None` for the global registry, whose recorder is reached through the
    /// `metrics` macros.
    local: Option<Arc<PrometheusRecorder>>,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a standalone registry with its own recorder.
    ///
    /// ```
    /// use hestia_telemetry::MetricsRegistry;
    /// use std::time::Duration;
    ///
    /// let registry = MetricsRegistry::new();
    /// registry.record_request("GET", 200, Duration::from_millis(4));
    /// assert!(registry.render().contains("hestia_http_requests_total"));
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let recorder = prometheus_builder().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, register_metric_descriptions);
        Self {
            local: Some(Arc::new(recorder)),
            handle,
        }
    }

    /// Returns the process-wide registry, installing it on first use.
    ///
    /// If another global `metrics` recorder was installed first, the returned
    /// registry still renders but will not see what [`record_request`]
    /// records.
    ///
    /// [`record_request`]: Self::record_request
    pub fn global() -> Self {
        GLOBAL.get_or_init(install_global).clone()
    }

    /// Records a completed request.
    ///
    /// Increments `hestia_http_requests_total` and observes
    /// `hestia_http_request_duration_seconds`.
    pub fn record_request(&self, method: &str, status_code: u16, duration: Duration) {
        match &self.local {
            Some(recorder) => metrics::with_local_recorder(recorder.as_ref(), || {
                emit_request(method, status_code, duration);
            }),
            None => emit_request(method, status_code, duration),
        }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("global", &self.local.is_none())
            .finish_non_exhaustive()
    }
}

fn prometheus_builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(REQUEST_DURATION_SECONDS.to_string()),
            DURATION_BUCKETS,
        )
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid histogram buckets, using summaries");
            PrometheusBuilder::new()
        })
}

fn install_global() -> MetricsRegistry {
    let recorder = prometheus_builder().build_recorder();
    let handle = recorder.handle();

    if let Err(e) = metrics::set_global_recorder(recorder) {
        tracing::warn!(error = %e, "a global metrics recorder is already installed");
    }

    register_metric_descriptions();
    MetricsRegistry {
        local: None,
        handle,
    }
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "HTTP request duration in seconds"
    );
}

fn emit_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        let a = MetricsRegistry::global();
        let b = MetricsRegistry::global();
        a.record_request("PATCH", 202, Duration::from_millis(3));
        assert_eq!(a.render(), b.render());
        assert!(b.render().contains("method=\"PATCH\""));
    }

    #[test]
    fn test_standalone_registry_sees_its_own_requests() {
        let registry = MetricsRegistry::new();
        registry.record_request("GET", 200, Duration::from_millis(12));
        registry.record_request("GET", 200, Duration::from_millis(30));

        let output = registry.render();
        assert!(output.contains(REQUESTS_TOTAL));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains(REQUEST_DURATION_SECONDS));
    }

    #[test]
    fn test_standalone_registries_are_isolated() {
        let first = MetricsRegistry::new();
        let second = MetricsRegistry::new();
        first.record_request("DELETE", 204, Duration::from_millis(1));

        assert!(first.render().contains("method=\"DELETE\""));
        assert!(!second.render().contains("method=\"DELETE\""));
        assert!(!MetricsRegistry::global().render().contains("method=\"DELETE\""));
    }

    #[test]
    fn test_clones_share_the_recorder() {
        let registry = MetricsRegistry::new();
        registry.clone().record_request("PUT", 201, Duration::from_millis(2));
        assert!(registry.render().contains("status=\"201\""));
    }
}
