//! Pipeline observability: per-call timing and event emission.
//!
//! Each pipeline call produces exactly one [`PipelineEvent`]. Events are
//! values handed to an [`EventSink`]; the sink decides whether they become
//! log lines, metrics, or test captures. Nothing here changes control flow.

use std::time::{Duration, Instant};

use axum::http::Method;
use tracing::{info_span, Span};

use crate::middleware::RequestId;

/// How a pipeline call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Binding or validation rejected the request; business logic never ran.
    ValidationFailed,
    /// Business logic returned an error.
    HandlerFailed,
    /// Business logic succeeded and the result was dispatched.
    Completed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::HandlerFailed => "handler_failed",
            Self::Completed => "completed",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Identifying tags shared by every event of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTags {
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
    pub route: String,
    pub request_id: RequestId,
}

/// The single structured event emitted for one pipeline call.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub tags: EventTags,
    pub outcome: Outcome,
    pub validation: Duration,
    /// Absent when the call never reached business logic.
    pub handler: Option<Duration>,
    pub total: Option<Duration>,
    /// Rendered error for failed calls.
    pub error: Option<String>,
}

/// Consumer of pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Default sink: structured `tracing` records plus Prometheus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        let tags = &event.tags;
        let validation_ms = millis(event.validation);
        let handler_ms = event.handler.map(millis);
        let total_ms = event.total.map(millis);

        match event.outcome {
            Outcome::ValidationFailed => tracing::error!(
                operation = tags.operation,
                method = %tags.method,
                path = %tags.path,
                route = %tags.route,
                validation_ms,
                error = event.error.as_deref().unwrap_or(""),
                "request validation failed"
            ),
            Outcome::HandlerFailed => tracing::error!(
                operation = tags.operation,
                method = %tags.method,
                path = %tags.path,
                route = %tags.route,
                validation_ms,
                handler_ms,
                total_ms,
                error = event.error.as_deref().unwrap_or(""),
                "handler failed"
            ),
            Outcome::Completed => tracing::info!(
                operation = tags.operation,
                method = %tags.method,
                path = %tags.path,
                route = %tags.route,
                validation_ms,
                handler_ms,
                total_ms,
                "request completed"
            ),
        }

        crate::metrics::record_pipeline_event(event);
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Per-call context: start instant, tags and the tracing span.
#[derive(Debug)]
pub struct InvocationContext {
    start: Instant,
    tags: EventTags,
    span: Span,
}

impl InvocationContext {
    pub fn new(tags: EventTags) -> Self {
        let span = info_span!(
            "pipeline",
            request_id = %tags.request_id,
            operation = tags.operation,
            method = %tags.method,
            path = %tags.path,
            route = %tags.route,
        );
        Self {
            start: Instant::now(),
            tags,
            span,
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn tags(&self) -> &EventTags {
        &self.tags
    }

    /// Start a recorder for this call's phases.
    pub fn recorder(self) -> Recorder {
        Recorder {
            ctx: self,
            validated_at: None,
            handler_started: None,
            handler_finished: None,
        }
    }
}

/// Tracks phase boundaries for one call and builds its event.
#[derive(Debug)]
pub struct Recorder {
    ctx: InvocationContext,
    validated_at: Option<Instant>,
    handler_started: Option<Instant>,
    handler_finished: Option<Instant>,
}

impl Recorder {
    pub fn span(&self) -> &Span {
        self.ctx.span()
    }

    /// Mark the end of binding and validation.
    pub fn validated(&mut self) {
        self.validated_at = Some(Instant::now());
    }

    pub fn handler_started(&mut self) {
        self.handler_started = Some(Instant::now());
    }

    pub fn handler_finished(&mut self) {
        self.handler_finished = Some(Instant::now());
    }

    fn validation(&self) -> Duration {
        self.validated_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.ctx.start)
    }

    fn handler(&self) -> Option<Duration> {
        let started = self.handler_started?;
        Some(
            self.handler_finished
                .unwrap_or_else(Instant::now)
                .duration_since(started),
        )
    }

    /// Finish the call and build its event.
    pub fn finish(self, outcome: Outcome, error: Option<String>) -> PipelineEvent {
        let validation = self.validation();
        let (handler, total) = match outcome {
            Outcome::ValidationFailed => (None, None),
            _ => (self.handler(), Some(self.ctx.start.elapsed())),
        };
        PipelineEvent {
            tags: self.ctx.tags,
            outcome,
            validation,
            handler,
            total,
            error,
        }
    }
}
