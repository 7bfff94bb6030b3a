//! RFC 9457 Problem Details for HTTP APIs.
//!
//! Provides structured error responses following the Problem Details standard.
//! See: <https://www.rfc-editor.org/rfc/rfc9457.html>

use axum::{
    extract::{OriginalUri, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use modgate_lib::Error as LibError;

use crate::bind::BindError;
use crate::middleware::{extract_or_generate_request_id, RequestId};
use crate::pipeline::PipelineError;
use crate::validation::{FieldViolation, ValidationError};

/// Problem type URI for requests that could not be bound.
pub const PROBLEM_INVALID_REQUEST: &str = "/problems/invalid-request";

/// Problem type URI for requests that failed validation.
pub const PROBLEM_VALIDATION_FAILED: &str = "/problems/validation-failed";

/// Problem type URI for missing items.
pub const PROBLEM_NOT_FOUND: &str = "/problems/not-found";

/// Problem type URI for conflicting writes.
pub const PROBLEM_CONFLICT: &str = "/problems/conflict";

/// Problem type URI for rate-limited clients.
pub const PROBLEM_RATE_LIMITED: &str = "/problems/rate-limited";

/// Problem type URI for internal server errors.
pub const PROBLEM_INTERNAL_ERROR: &str = "/problems/internal-error";

/// RFC 9457 Problem Details response structure.
///
/// # Example
///
/// ```
/// use modgate_service_shared::{ProblemDetails, PROBLEM_NOT_FOUND};
/// use axum::http::StatusCode;
///
/// let problem = ProblemDetails::new(PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND)
///     .with_detail("site 42 not found")
///     .with_request_id("req-12345");
/// assert_eq!(problem.status, 404);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type (relative).
    #[serde(rename = "type")]
    pub type_uri: String,

    /// Short, human-readable summary of the problem.
    pub title: String,

    /// HTTP status code for this problem.
    pub status: u16,

    /// Human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request id of the failed call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Field-level violations for validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl ProblemDetails {
    /// Create a new ProblemDetails with required fields.
    pub fn new(type_uri: impl Into<String>, title: impl Into<String>, status: StatusCode) -> Self {
        Self {
            type_uri: type_uri.into(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            instance: None,
            violations: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.instance = Some(request_id.into());
        self
    }

    /// 400 for input that could not be bound.
    pub fn bad_request(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INVALID_REQUEST,
            "Invalid Request",
            StatusCode::BAD_REQUEST,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// 422 carrying every violated constraint.
    pub fn validation_failed(error: &ValidationError, request_id: impl Into<String>) -> Self {
        let mut problem = Self::new(
            PROBLEM_VALIDATION_FAILED,
            "Validation Failed",
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .with_detail(error.to_string())
        .with_request_id(request_id);
        problem.violations = error.violations.clone();
        problem
    }

    pub fn not_found(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_NOT_FOUND, "Not Found", StatusCode::NOT_FOUND)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn conflict(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(PROBLEM_CONFLICT, "Conflict", StatusCode::CONFLICT)
            .with_detail(detail)
            .with_request_id(request_id)
    }

    pub fn too_many_requests(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_RATE_LIMITED,
            "Too Many Requests",
            StatusCode::TOO_MANY_REQUESTS,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }

    /// Create a 500 Internal Server Error problem.
    pub fn internal_error(detail: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self::new(
            PROBLEM_INTERNAL_ERROR,
            "Internal Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
        .with_request_id(request_id)
    }
}

impl std::fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.detail.as_deref().unwrap_or(""))
    }
}

impl std::error::Error for ProblemDetails {}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Json(&self).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        *response.status_mut() = status;
        response
    }
}

/// Business errors that know their HTTP rendering.
pub trait IntoProblem {
    fn to_problem(&self, request_id: &str) -> ProblemDetails;
}

impl IntoProblem for ProblemDetails {
    fn to_problem(&self, request_id: &str) -> ProblemDetails {
        let mut problem = self.clone();
        if problem.instance.is_none() {
            problem.instance = Some(request_id.to_string());
        }
        problem
    }
}

impl IntoProblem for LibError {
    fn to_problem(&self, request_id: &str) -> ProblemDetails {
        match self {
            LibError::NotFound { .. } => ProblemDetails::not_found(self.to_string(), request_id),
            LibError::Conflict { .. } => ProblemDetails::conflict(self.to_string(), request_id),
            LibError::EmptyUpdate { .. } => {
                ProblemDetails::bad_request(self.to_string(), request_id)
            }
            LibError::Storage { .. } => {
                ProblemDetails::internal_error("the item store is unavailable", request_id)
            }
        }
    }
}

impl IntoProblem for BindError {
    fn to_problem(&self, request_id: &str) -> ProblemDetails {
        ProblemDetails::bad_request(self.to_string(), request_id)
    }
}

impl IntoProblem for ValidationError {
    fn to_problem(&self, request_id: &str) -> ProblemDetails {
        ProblemDetails::validation_failed(self, request_id)
    }
}

/// Translate any pipeline failure into its HTTP problem.
pub fn translate<E: IntoProblem>(error: &PipelineError<E>, request_id: &str) -> ProblemDetails {
    match error {
        PipelineError::Bind(e) => e.to_problem(request_id),
        PipelineError::Validation(e) => e.to_problem(request_id),
        PipelineError::Business(e) => e.to_problem(request_id),
    }
}

/// Fallback handler: `404` problem for a path no route matches.
pub async fn route_not_found(req: Request) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| extract_or_generate_request_id(req.headers()));
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.path())
        .unwrap_or_else(|| req.uri().path());

    ProblemDetails::not_found(format!("no route matches {path}"), request_id.as_str())
        .into_response()
}
