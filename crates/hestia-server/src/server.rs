//! HTTP serving.
//!
//! Binds the listener, accepts HTTP/1.1 connections and feeds every request
//! through the [`Pipeline`]. Closing is cooperative: once the
//! [`ShutdownSignal`] fires the listener is dropped, each open connection
//! finishes its in-flight request, and serving returns after the connections
//! drain or the drain timeout expires.

use crate::error::ServeError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use hestia_config::ServerOptions;
use hestia_middleware::{MiddlewareContext, Pipeline, Request, Response, ResponseExt};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Smallest read buffer hyper accepts.
const MIN_BUF_SIZE: usize = 8192;

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Connection and request limits taken from [`ServerOptions`].
#[derive(Debug, Clone)]
pub(crate) struct ServeSettings {
    keep_alive: bool,
    read: Option<Duration>,
    read_header: Option<Duration>,
    write: Option<Duration>,
    max_buf_size: usize,
    drain_timeout: Duration,
}

impl ServeSettings {
    pub(crate) fn from_options(options: &ServerOptions) -> Self {
        let timeouts = &options.timeouts;
        Self {
            keep_alive: !timeouts.idle().is_zero(),
            read: non_zero(timeouts.read()),
            read_header: non_zero(timeouts.read_header()),
            write: non_zero(timeouts.write()),
            max_buf_size: options.limits.header_bytes.max(MIN_BUF_SIZE),
            drain_timeout: options.lifecycle.drain_timeout(),
        }
    }
}

/// Zero disables a timeout.
fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}

/// Serves a [`Pipeline`] over HTTP/1.1.
pub(crate) struct HttpServer {
    settings: ServeSettings,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    pub(crate) fn new(settings: ServeSettings, pipeline: Pipeline) -> Self {
        Self {
            settings,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Binds `addr`, classifying "address in use" separately.
    pub(crate) async fn bind(&self, addr: &str) -> Result<TcpListener, ServeError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::from_bind(addr, source))
    }

    /// Accepts connections until `close` fires, then drains.
    ///
    /// Accept failures go to `report` and do not stop serving.
    pub(crate) async fn serve<R>(self: Arc<Self>, listener: TcpListener, close: ShutdownSignal, report: R)
    where
        R: Fn(ServeError) + Send + Sync,
    {
        let tracker = ConnectionTracker::new();
        let closed = close.triggered();
        tokio::pin!(closed);

        loop {
            tokio::select! {
                () = &mut closed => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let guard = tracker.track();
                        let server = Arc::clone(&self);
                        let close = close.clone();
                        tokio::spawn(async move {
                            server.serve_connection(stream, remote_addr, close).await;
                            drop(guard);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        report(ServeError::Accept(e));
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        tracing::debug!(
            connections = tracker.active(),
            timeout = ?self.settings.drain_timeout,
            "Listener closed, draining connections"
        );

        if tokio::time::timeout(self.settings.drain_timeout, tracker.drained())
            .await
            .is_err()
        {
            tracing::warn!(
                connections = tracker.active(),
                "Drain timeout reached with connections still open"
            );
        }
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        close: ShutdownSignal,
    ) {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, remote_addr).await) }
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.settings.read_header)
            .max_buf_size(self.settings.max_buf_size)
            .keep_alive(self.settings.keep_alive);

        let connection = builder.serve_connection(io, service);
        tokio::pin!(connection);

        let result = tokio::select! {
            result = connection.as_mut() => result,
            () = close.triggered() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };

        if let Err(e) = result {
            tracing::debug!(remote_addr = %remote_addr, error = %e, "Connection ended with error");
        }
    }

    async fn handle_request(&self, request: http::Request<Incoming>, remote_addr: SocketAddr) -> Response {
        let (parts, body) = request.into_parts();

        let body = match within(self.settings.read, body.collect()).await {
            Some(Ok(collected)) => collected.to_bytes(),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return Response::error(StatusCode::BAD_REQUEST, "failed to read request body");
            }
            None => {
                return Response::error(StatusCode::REQUEST_TIMEOUT, "request body read timed out");
            }
        };

        let request: Request = http::Request::from_parts(parts, Full::new(body));
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let mut ctx = MiddlewareContext::with_remote_addr(remote_addr);

        match within(self.settings.write, self.pipeline.process(&mut ctx, request)).await {
            Some(response) => response,
            None => {
                tracing::warn!(method = %method, path = %path, "Handler timed out");
                Response::error(StatusCode::GATEWAY_TIMEOUT, "handler timed out")
            }
        }
    }
}

/// Runs `future`, giving up after `limit` when one is set.
async fn within<F: Future>(limit: Option<Duration>, future: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.ok(),
        None => Some(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hestia_middleware::handler_fn;

    fn settings() -> ServeSettings {
        let mut options = ServerOptions::default();
        options.timeouts.write_ms = 200;
        options.lifecycle.drain_timeout_secs = 1;
        ServeSettings::from_options(&options)
    }

    fn pipeline() -> Pipeline {
        Pipeline::builder().build(handler_fn(|_ctx, req| {
            let slow = req.uri().path() == "/slow";
            async move {
                if slow {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                let body = req
                    .into_body()
                    .collect()
                    .await
                    .map(|c| c.to_bytes())
                    .unwrap_or_default();
                Response::text(StatusCode::OK, String::from_utf8_lossy(&body).to_string())
            }
        }))
    }

    #[test]
    fn test_settings_from_options() {
        let mut options = ServerOptions::default();
        options.timeouts.idle_secs = 0;
        options.timeouts.read_ms = 0;
        options.limits.header_bytes = 1024;

        let settings = ServeSettings::from_options(&options);
        assert!(!settings.keep_alive);
        assert_eq!(settings.read, None);
        assert_eq!(settings.max_buf_size, MIN_BUF_SIZE);
        assert_eq!(settings.read_header, Some(options.timeouts.read_header()));
    }

    #[tokio::test]
    async fn test_bind_conflict_is_address_in_use() {
        let server = HttpServer::new(settings(), pipeline());
        let first = server.bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        let err = server.bind(&addr).await.unwrap_err();
        assert!(matches!(err, ServeError::AddressInUse { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_serves_until_closed() {
        let server = Arc::new(HttpServer::new(settings(), pipeline()));
        let listener = server.bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let close = ShutdownSignal::new();

        let task = tokio::spawn(Arc::clone(&server).serve(listener, close.clone(), |_| {}));

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let body = client
            .post(format!("http://{addr}/echo"))
            .body("ping")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ping");

        let status = client
            .get(format!("http://{addr}/slow"))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::GATEWAY_TIMEOUT);

        close.trigger();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("serve should return after close")
            .unwrap();

        assert!(client.get(format!("http://{addr}/echo")).send().await.is_err());
    }
}
