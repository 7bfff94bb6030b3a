//! Liveness and readiness probes for the front router.
//!
//! Readiness means at least one module made it through gateway mounting.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Body of both probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `ok`, or `not_ready` with a `reason`.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub service: String,

    pub version: String,

    /// Mounted modules; readiness only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<String>>,
}

/// Probe state: who is answering and which modules are mounted.
#[derive(Debug, Clone)]
pub struct Readiness {
    inner: Arc<ProbeInfo>,
}

#[derive(Debug, Clone)]
struct ProbeInfo {
    service: String,
    version: String,
    modules: Vec<String>,
}

impl Readiness {
    pub fn new(service: impl Into<String>, modules: Vec<String>) -> Self {
        Self {
            inner: Arc::new(ProbeInfo {
                service: service.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                modules,
            }),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).version = version.into();
        self
    }

    pub fn modules(&self) -> &[String] {
        &self.inner.modules
    }

    fn status(&self, reason: Option<&str>, modules: Option<Vec<String>>) -> HealthStatus {
        HealthStatus {
            status: if reason.is_some() { "not_ready" } else { "ok" }.to_string(),
            reason: reason.map(str::to_string),
            service: self.inner.service.clone(),
            version: self.inner.version.clone(),
            modules,
        }
    }
}

/// `GET /health/live`: the process is up.
pub async fn health_live(State(readiness): State<Readiness>) -> Response {
    (StatusCode::OK, Json(readiness.status(None, None))).into_response()
}

/// `GET /health/ready`: 503 until a module is mounted.
///
/// ```text
/// {"status":"ok","service":"modgate","version":"0.1.0","modules":["todo","task"]}
/// ```
pub async fn health_ready(State(readiness): State<Readiness>) -> Response {
    if readiness.modules().is_empty() {
        let body = readiness.status(Some("no modules mounted"), None);
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    }
    let body = readiness.status(None, Some(readiness.modules().to_vec()));
    (StatusCode::OK, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body(response: Response) -> HealthStatus {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_live_omits_modules() {
        let readiness = Readiness::new("modgate", vec!["todo".to_string()]);
        let response = health_live(State(readiness)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let status = body(response).await;
        assert_eq!(status.status, "ok");
        assert_eq!(status.service, "modgate");
        assert!(status.modules.is_none());
    }

    #[tokio::test]
    async fn test_ready_lists_modules() {
        let readiness =
            Readiness::new("modgate", vec!["todo".to_string(), "task".to_string()])
                .with_version("9.9.9");
        let response = health_ready(State(readiness)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let status = body(response).await;
        assert_eq!(status.version, "9.9.9");
        assert_eq!(status.modules.unwrap(), vec!["todo", "task"]);
    }

    #[tokio::test]
    async fn test_not_ready_without_modules() {
        let response = health_ready(State(Readiness::new("modgate", Vec::new()))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let status = body(response).await;
        assert_eq!(status.status, "not_ready");
        assert_eq!(status.reason.as_deref(), Some("no modules mounted"));
    }
}
