//! The modgate server: todo, task and agrifolio modules behind one gateway.
//!
//! # Endpoints
//!
//! - `/todo/...`, `/task/...`, `/agrifolio/...` - module routers, see [`apps`]
//! - `GET /metrics` - Prometheus metrics endpoint, mounted only when enabled
//! - `GET /health/live` - Kubernetes liveness probe
//! - `GET /health/ready` - Kubernetes readiness probe, lists mounted modules

#![deny(warnings)]

pub mod apps;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use modgate_gateway::{Gateway, GatewayError, Module};
use modgate_service_shared::{
    health_live, health_ready, label_route, metrics_handler, rate_limit, record_modules_mounted,
    route_not_found, MetricsConfig, MetricsLayer, Pipeline, RateLimiter, Readiness, ServerConfig,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The modules this server mounts, in mount order.
pub fn modules(pipeline: &Pipeline) -> Vec<Module> {
    vec![
        apps::todo::module(pipeline),
        apps::task::module(pipeline),
        apps::agrifolio::module(pipeline),
    ]
}

/// Give a module router the front router's conventions: metric labels
/// under its mount prefix and problem responses for unknown paths.
fn prepare(mut module: Module) -> Module {
    let prefix = module.mount_prefix();
    module.router = module.router.map(|router| {
        router
            .fallback(route_not_found)
            .layer(from_fn_with_state(prefix, label_route))
    });
    module
}

/// Assemble the front router.
///
/// Health and metrics routes sit beside the module prefixes and win over
/// them; the metrics route exists only while metrics are enabled. Rate
/// limiting runs inside the request-id layer so refusals still carry an
/// `X-Request-ID`.
///
/// # Errors
///
/// Only in strict mode (`GATEWAY_STRICT`): a module without a router or a
/// repeated prefix.
pub fn build_app(
    config: &ServerConfig,
    metrics: &MetricsConfig,
    limiter: RateLimiter,
    modules: Vec<Module>,
) -> Result<Router, GatewayError> {
    let gateway = if config.strict_gateway {
        Gateway::strict()
    } else {
        Gateway::new()
    };
    let gateway = gateway
        .with_not_found(Router::new().fallback(route_not_found))
        .mount_all(modules.into_iter().map(prepare))?;

    let mounted = gateway.modules();
    info!(
        modules = ?mounted,
        patterns = ?gateway.patterns(),
        strict = gateway.is_strict(),
        metrics = metrics.enabled,
        "gateway ready"
    );
    record_modules_mounted(mounted.len());

    let readiness = Readiness::new("modgate", mounted).with_version(env!("CARGO_PKG_VERSION"));
    let mut front = Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .with_state(readiness);
    if metrics.enabled {
        front = front.route(&metrics.path, get(metrics_handler));
    }

    let app = gateway
        .into_router()
        .merge(front)
        .layer(from_fn_with_state(String::new(), label_route))
        .layer(from_fn_with_state(limiter, rate_limit))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(MetricsLayer);

    Ok(app)
}
