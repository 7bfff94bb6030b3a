//! Prometheus exposition for the gateway.
//!
//! One global recorder, installed at start-up by [`init_metrics`] and
//! rendered by [`metrics_handler`]. The `record_*` helpers are no-ops until
//! a recorder exists, so tests can call them freely.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use modgate_service_shared::metrics::{init_metrics, metrics_handler, MetricsConfig};
//!
//! let config = MetricsConfig::from_env();
//! if init_metrics(&config).is_ok() {
//!     let app: Router = Router::new().route(&config.path, get(metrics_handler));
//! #   drop(app);
//! }
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observe::PipelineEvent;

static RECORDER: OnceCell<PrometheusHandle> = OnceCell::new();

const DEFAULT_PATH: &str = "/metrics";

/// `METRICS_ENABLED` and `METRICS_PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Front-router path serving the exposition.
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_PATH.to_string(),
        }
    }
}

impl MetricsConfig {
    /// Only the literal `false` (any case) disables metrics.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("METRICS_ENABLED")
            .map(|v| !v.trim().eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        let path = lookup("METRICS_PATH")
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| DEFAULT_PATH.to_string());
        Self { enabled, path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("metrics are disabled")]
    Disabled,
    #[error("metrics recorder already initialized")]
    AlreadyInitialized,
    #[error("failed to install metrics recorder: {0}")]
    InstallFailed(String),
}

/// Install the global Prometheus recorder.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }
    if RECORDER.get().is_some() {
        return Err(MetricsError::AlreadyInitialized);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;
    RECORDER
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    RECORDER.get()
}

/// `GET /metrics`.
pub async fn metrics_handler() -> String {
    match RECORDER.get() {
        Some(handle) => handle.render(),
        None => "# metrics disabled\n".to_string(),
    }
}

// =============================================================================
// Pipeline metrics
// =============================================================================

/// Record one pipeline event.
///
/// Increments `pipeline_requests_total{operation,route,outcome}` and records
/// each measured phase into `pipeline_phase_duration_seconds{phase}`.
pub fn record_pipeline_event(event: &PipelineEvent) {
    metrics::counter!(
        "pipeline_requests_total",
        "operation" => event.tags.operation,
        "route" => event.tags.route.clone(),
        "outcome" => event.outcome.as_str()
    )
    .increment(1);

    metrics::histogram!("pipeline_phase_duration_seconds", "phase" => "validation")
        .record(event.validation.as_secs_f64());
    if let Some(handler) = event.handler {
        metrics::histogram!("pipeline_phase_duration_seconds", "phase" => "handler")
            .record(handler.as_secs_f64());
    }
    if let Some(total) = event.total {
        metrics::histogram!("pipeline_phase_duration_seconds", "phase" => "total")
            .record(total.as_secs_f64());
    }
}

/// Record a request refused by the rate limiter.
///
/// Refusals happen before routing, so the counter carries no path label.
pub fn record_rate_limit_hit() {
    metrics::counter!("rate_limit_hits_total").increment(1);
}

/// Record the module count at start-up.
pub fn record_modules_mounted(count: usize) {
    metrics::gauge!("gateway_modules_mounted").set(count as f64);
}
