//! Liveness and readiness probes.
//!
//! A [`Probe`] is an ordered list of checks. Every check runs on each probe
//! request, one after the other, and their failures are collected:
//!
//! - no failure: `200` with the JSON body `"ok"`
//! - `k` failures: `500` with a JSON array of the `k` error messages
//!
//! # Example
//!
//! ```rust
//! use hestia_server::{Probe, ProbeError};
//!
//! let readiness = Probe::new()
//!     .add_check(|| async { Ok(()) })
//!     .add_check(|| async { Err(ProbeError::new("database unreachable")) });
//!
//! # tokio_test::block_on(async {
//! let errors = readiness.run().await;
//! assert_eq!(errors, vec!["database unreachable".to_string()]);
//! # });
//! ```

use crate::error::ProbeError;
use hestia_core::BoxFuture;
use hestia_middleware::{Handler, MiddlewareContext, Request, Response, ResponseExt};
use http::StatusCode;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A single probe check.
pub type ProbeCheck = Arc<dyn Fn() -> BoxFuture<'static, Result<(), ProbeError>> + Send + Sync>;

/// Body of a passing probe.
const OK_BODY: &str = "\"ok\"";

/// Ordered list of probe checks.
#[derive(Clone, Default)]
#[must_use]
pub struct Probe {
    checks: Vec<ProbeCheck>,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl Probe {
    /// Creates a probe with no checks. It always passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a check.
    pub fn add_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ProbeError>> + Send + 'static,
    {
        self.checks.push(Arc::new(move || Box::pin(check())));
        self
    }

    /// Appends an already boxed check.
    pub fn add_shared_check(mut self, check: ProbeCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Returns the number of checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns whether the probe has no checks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs every check in order and returns the failure messages.
    pub async fn run(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for check in &self.checks {
            if let Err(e) = check().await {
                errors.push(e.to_string());
            }
        }
        errors
    }

    /// Runs the checks and renders the probe response.
    pub async fn respond(&self) -> Response {
        let errors = self.run().await;
        if errors.is_empty() {
            return Response::json(StatusCode::OK, OK_BODY);
        }

        let body = match serde_json::to_vec(&errors) {
            Ok(body) => body,
            Err(e) => serde_json::to_vec(&e.to_string()).unwrap_or_default(),
        };
        Response::json(StatusCode::INTERNAL_SERVER_ERROR, body)
    }
}

/// Route handler serving a [`Probe`].
#[derive(Debug, Clone)]
pub struct ProbeEndpoint {
    name: &'static str,
    probe: Probe,
}

impl ProbeEndpoint {
    /// Creates an endpoint named `name` (used in logs).
    pub fn new(name: &'static str, probe: Probe) -> Self {
        Self { name, probe }
    }

    /// Returns the endpoint name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl Handler for ProbeEndpoint {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        _request: Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let response = self.probe.respond().await;
            if !response.status().is_success() {
                tracing::debug!(probe = self.name, status = %response.status(), "Probe failed");
            }
            response
        })
    }
}
