//! modgate HTTP server.
//!
//! # Configuration
//!
//! - `SERVICE_PORT` - HTTP port (default: 8080)
//! - `GATEWAY_STRICT` - refuse to start on module wiring errors (default: false)
//! - `RATE_LIMIT_REQUESTS`, `RATE_LIMIT_WINDOW_SECS` - per-client limit (default: 20 per 1s)
//! - `SHUTDOWN_TIMEOUT_SECS` - drain time after a shutdown signal (default: 30)
//! - `BODY_LIMIT_BYTES` - maximum request body (default: 1 MiB)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `METRICS_ENABLED`, `METRICS_PATH` - Prometheus exposition (default: on, `/metrics`)

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{error, info, warn};

use modgate_server::{build_app, modules};
use modgate_service_shared::{
    init_logging, init_metrics, LoggingConfig, MetricsConfig, Pipeline, RateLimiter, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service("modgate");
    init_logging(&logging_config)?;

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = ServerConfig::from_env().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;
    info!(
        port = config.port,
        strict_gateway = config.strict_gateway,
        rate_limit_requests = config.rate_limit_requests,
        rate_limit_window_ms = config.rate_limit_window.as_millis() as u64,
        "starting modgate"
    );

    let pipeline = Pipeline::default().with_body_limit(config.body_limit);
    let limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window);
    spawn_limiter_gc(limiter.clone());

    let app = build_app(&config, &metrics_config, limiter, modules(&pipeline)).map_err(|e| {
        error!(error = %e, "gateway wiring failed");
        e
    })?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "listening on");

    let signalled = Arc::new(Notify::new());
    let trigger = signalled.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        trigger.notify_one();
    })
    .into_future();

    let drain_deadline = async {
        signalled.notified().await;
        tokio::time::sleep(config.shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result?,
        _ = drain_deadline => {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "connections still open after shutdown timeout, exiting"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

fn spawn_limiter_gc(limiter: RateLimiter) {
    let period = limiter.window().max(Duration::from_secs(1)) * 2;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            limiter.gc();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "ctrl-c", "shutdown requested"),
        _ = terminate => info!(signal = "terminate", "shutdown requested"),
    }
}
