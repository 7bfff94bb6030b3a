//! Shared request pipeline and HTTP infrastructure for modgate modules.
//!
//! - [`Pipeline`]: registers endpoints that bind, validate, run business
//!   logic and dispatch the result, emitting one [`PipelineEvent`] per call
//! - [`Validate`]: the validation capability request types implement
//! - [`ProblemDetails`]: RFC 9457 Problem Details for error responses
//! - [`health`]: liveness and readiness handlers
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request ids, HTTP metrics and rate limiting
//! - Request types for the item endpoints
//!
//! # Architecture
//!
//! Handlers stay thin; item semantics live in `modgate-lib`:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Endpoint (Pipeline::handle)                                │
//! │  - Bind path/query/body onto the request type               │
//! │  - Validate (and apply defaults)                            │
//! │  - Call the business function (modgate-lib ItemService)     │
//! │  - Dispatch JSON or empty response                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides an in-memory event sink. Enable the
//! `test-utils` feature to access it from dependent crates.

#![deny(warnings)]

mod bind;
mod config;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod observe;
mod pipeline;
mod problem;
mod request;
mod response;
mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bind::{bind, split_request, BindError, Call, RawRequest, DEFAULT_BODY_LIMIT};
pub use config::{ConfigError, ServerConfig};
pub use health::{health_live, health_ready, HealthStatus, Readiness};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use metrics::{
    init_metrics, metrics_handler, record_modules_mounted, record_pipeline_event,
    record_rate_limit_hit, MetricsConfig, MetricsError,
};
pub use middleware::{
    client_key, extract_or_generate_request_id, label_route, rate_limit, route_label,
    MetricsLayer, RateLimiter, RequestId, RouteLabel, UNMATCHED_ROUTE,
};
pub use observe::{
    EventSink, EventTags, InvocationContext, Outcome, PipelineEvent, Recorder, TracingSink,
};
pub use pipeline::{run, Endpoint, EndpointMarker, Pipeline, PipelineError};
pub use problem::{
    route_not_found, translate, IntoProblem, ProblemDetails, PROBLEM_CONFLICT, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST, PROBLEM_NOT_FOUND, PROBLEM_RATE_LIMITED, PROBLEM_VALIDATION_FAILED,
};
pub use request::{
    CreateItemRequest, CreateUserRequest, EmptyRequest, ItemIdRequest, ListItemsRequest,
    UpdateItemRequest, UpdateUserRequest,
};
pub use response::{Dispatch, EmptyDispatcher, JsonDispatcher};
pub use validation::{FieldViolation, Validate, ValidationError, Violations};
