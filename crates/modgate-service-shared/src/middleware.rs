//! HTTP middleware for the front router.
//!
//! This module provides:
//! - [`RequestId`]: Newtype for correlation ID extraction/generation
//! - [`MetricsLayer`]: Tower middleware that assigns request ids and records
//!   HTTP metrics
//! - [`RateLimiter`] and [`rate_limit`]: fixed-window per-client limiting
//!
//! # Request ID Propagation
//!
//! `MetricsLayer` takes the `X-Request-ID` header if present, otherwise
//! generates a UUID v7. The id is stored in the request extensions, where
//! pipeline endpoints pick it up, and echoed on the response.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, MatchedPath, Request as AxumRequest, State};
use axum::http::{HeaderMap, HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use dashmap::DashMap;
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::problem::ProblemDetails;

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Newtype wrapper for request correlation IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new UUID v7 request ID.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Extract the request ID from headers or generate a new UUID v7.
///
/// Empty or non-UTF-8 header values are treated as missing.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Metric label of the route that answered a request: the module's mount
/// prefix joined with the pattern its router matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLabel(pub String);

/// Label for requests no route pattern matched.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Join a mount prefix and a matched route pattern.
///
/// ```
/// use modgate_service_shared::middleware::route_label;
///
/// assert_eq!(route_label("/todo", "/api/todos/{id}"), "/todo/api/todos/{id}");
/// assert_eq!(route_label("/todo", "/"), "/todo");
/// assert_eq!(route_label("", "/health/live"), "/health/live");
/// ```
pub fn route_label(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), pattern) {
        (true, _) => pattern.to_string(),
        (false, "/" | "") => prefix.to_string(),
        (false, _) => format!("{prefix}{pattern}"),
    }
}

/// axum middleware tagging matched responses with a [`RouteLabel`].
///
/// Install with `Router::layer(from_fn_with_state(prefix, label_route))`;
/// fallback responses carry no label and are counted as [`UNMATCHED_ROUTE`].
pub async fn label_route(
    State(prefix): State<String>,
    req: AxumRequest,
    next: Next,
) -> axum::response::Response {
    let label = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| route_label(&prefix, matched.as_str()));

    let mut response = next.run(req).await;
    if let Some(label) = label {
        response.extensions_mut().insert(RouteLabel(label));
    }
    response
}

fn status_bucket(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

// =============================================================================
// MetricsLayer
// =============================================================================

/// Tower layer that assigns request ids and records:
/// - `http_requests_total`: Counter by method, path, status bucket
/// - `http_request_duration_seconds`: Histogram by method, path
/// - `http_request_size_bytes`: Histogram by method, path
/// - `http_response_size_bytes`: Histogram by method, path
///
/// `path` is the response's [`RouteLabel`], or [`UNMATCHED_ROUTE`].
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

/// Middleware service behind [`MetricsLayer`].
#[derive(Debug, Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

fn content_length(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse::<f64>()
        .ok()
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: http_body::Body + Send + 'static,
    ResBody: http_body::Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = MetricsFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let request_size = content_length(req.headers());

        let request_id = extract_or_generate_request_id(req.headers());
        req.extensions_mut().insert(request_id.clone());

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %req.uri().path(),
            remote_addr = remote_addr.as_deref().unwrap_or("-"),
        );
        span.in_scope(|| tracing::debug!("handling request"));

        MetricsFuture {
            inner: self.inner.call(req),
            start,
            method,
            request_size,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Future wrapper that records metrics and echoes the request id.
    pub struct MetricsFuture<F> {
        #[pin]
        inner: F,
        start: Instant,
        method: String,
        request_size: Option<f64>,
        request_id: RequestId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for MetricsFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: http_body::Body,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let duration = this.start.elapsed();
        let latency_ms = duration.as_secs_f64() * 1000.0;
        let path = match &result {
            Ok(response) => response
                .extensions()
                .get::<RouteLabel>()
                .map(|label| label.0.clone())
                .unwrap_or_else(|| UNMATCHED_ROUTE.to_string()),
            Err(_) => UNMATCHED_ROUTE.to_string(),
        };

        metrics::histogram!(
            "http_request_duration_seconds",
            "method" => this.method.clone(),
            "path" => path.clone()
        )
        .record(duration.as_secs_f64());
        if let Some(size) = *this.request_size {
            metrics::histogram!(
                "http_request_size_bytes",
                "method" => this.method.clone(),
                "path" => path.clone()
            )
            .record(size);
        }

        match result {
            Ok(mut response) => {
                let status = response.status().as_u16();
                metrics::counter!(
                    "http_requests_total",
                    "method" => this.method.clone(),
                    "path" => path.clone(),
                    "status" => status_bucket(status)
                )
                .increment(1);

                if let Some(size) = content_length(response.headers()) {
                    metrics::histogram!(
                        "http_response_size_bytes",
                        "method" => this.method.clone(),
                        "path" => path
                    )
                    .record(size);
                }

                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }

                tracing::info!(status, latency_ms, "request completed");
                Poll::Ready(Ok(response))
            }
            Err(err) => {
                metrics::counter!(
                    "http_requests_total",
                    "method" => this.method.clone(),
                    "path" => path,
                    "status" => "5xx"
                )
                .increment(1);

                tracing::error!(latency_ms, "request failed");
                Poll::Ready(Err(err))
            }
        }
    }
}

// =============================================================================
// Rate limiting
// =============================================================================

struct ClientWindow {
    count: u64,
    started: Instant,
}

/// Fixed-window per-client rate limiter.
///
/// Each client gets `max_requests` per `window`; the counter resets when
/// the window expires. Clones share the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<DashMap<String, ClientWindow>>,
    max_requests: u64,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("clients", &self.clients.len())
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    /// Count one request from `client`; `false` means it must be refused.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| ClientWindow {
                count: 0,
                started: now,
            });

        if now.duration_since(entry.started) >= self.window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Drop clients whose window expired long ago.
    pub fn gc(&self) {
        let now = Instant::now();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window * 2);
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Rate-limit key: first `X-Forwarded-For` hop, else the peer address,
/// else `anonymous`.
pub fn client_key<B>(req: &Request<B>) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(hop) = forwarded {
        return hop.to_string();
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// axum middleware enforcing a [`RateLimiter`].
///
/// Install with `axum::middleware::from_fn_with_state(limiter, rate_limit)`.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: AxumRequest,
    next: Next,
) -> axum::response::Response {
    let client = client_key(&req);
    if limiter.check(&client) {
        return next.run(req).await;
    }

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| extract_or_generate_request_id(req.headers()));

    tracing::warn!(
        client = %client,
        path = %req.uri().path(),
        request_id = %request_id,
        "rate limit exceeded"
    );
    crate::metrics::record_rate_limit_hit();

    ProblemDetails::too_many_requests(
        format!("too many requests, retry after {:?}", limiter.window()),
        request_id.as_str(),
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    #[test]
    fn test_request_id_generate() {
        let id1 = RequestId::generate();
        let id2 = RequestId::generate();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
    }

    #[test]
    fn test_extract_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-ID", HeaderValue::from_static("test-123"));
        assert_eq!(extract_or_generate_request_id(&headers).as_str(), "test-123");
    }

    #[test]
    fn test_extract_request_id_generates_when_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(""));
        assert_eq!(extract_or_generate_request_id(&headers).as_str().len(), 36);
    }

    #[test]
    fn test_route_label() {
        assert_eq!(route_label("/task", "/api/tasks/{id}"), "/task/api/tasks/{id}");
        assert_eq!(route_label("/", "/api/tasks"), "/api/tasks");
        assert_eq!(route_label("/agrifolio", ""), "/agrifolio");
    }

    async fn label_of(app: Router, uri: &str) -> Option<RouteLabel> {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.extensions().get::<RouteLabel>().cloned()
    }

    #[tokio::test]
    async fn test_label_route_uses_matched_pattern() {
        let app = Router::new()
            .route("/api/items/{id}", get(|| async { "item" }))
            .layer(axum::middleware::from_fn_with_state(
                "/todo".to_string(),
                label_route,
            ));

        for id in ["1", "not-a-uuid", "6f1c2a54-8f0e-4a53-9a43-0b7d1c9b3f10"] {
            assert_eq!(
                label_of(app.clone(), &format!("/api/items/{id}")).await,
                Some(RouteLabel("/todo/api/items/{id}".to_string()))
            );
        }
        assert_eq!(label_of(app.clone(), "/nowhere-1/x").await, None);
        assert_eq!(label_of(app, "/nowhere-2/x").await, None);
    }

    #[test]
    fn test_status_bucket() {
        assert_eq!(status_bucket(204), "2xx");
        assert_eq!(status_bucket(422), "4xx");
        assert_eq!(status_bucket(503), "5xx");
        assert_eq!(status_bucket(99), "other");
    }

    #[test]
    fn test_rate_limiter_allows_up_to_max() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_rate_limiter_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(5));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(10));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_rate_limiter_gc() {
        let limiter = RateLimiter::new(1, Duration::from_millis(1));
        limiter.check("a");
        std::thread::sleep(Duration::from_millis(5));
        limiter.gc();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(())
            .unwrap();
        assert_eq!(client_key(&req), "10.0.0.1");

        let anonymous = Request::builder().body(()).unwrap();
        assert_eq!(client_key(&anonymous), "anonymous");
    }

    async fn echo_id(Extension(id): Extension<RequestId>) -> String {
        id.0
    }

    #[tokio::test]
    async fn test_metrics_layer_propagates_request_id() {
        let app = Router::new()
            .route("/id", get(echo_id))
            .layer(MetricsLayer);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/id")
                    .header("x-request-id", "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "abc");
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"abc");
    }

    #[tokio::test]
    async fn test_rate_limit_middleware_returns_429() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit));

        let first = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), 200);

        let second = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), 429);
        assert_eq!(
            second.headers()[http::header::CONTENT_TYPE],
            "application/problem+json"
        );
    }
}
