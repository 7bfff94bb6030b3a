//! The request pipeline: bind, validate, run business logic, dispatch.
//!
//! ```text
//! raw request ─► bind ─► validate ─► business fn ─► dispatcher ─► response
//!                  │         │             │
//!                  └─────────┴─────────────┴─► one PipelineEvent per call
//! ```
//!
//! [`run`] is the generic core and returns failures unchanged. [`Pipeline`]
//! wraps it into axum handlers that translate failures into RFC 9457
//! problem responses.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::handler::Handler;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::bind::{bind, split_request, BindError, Call, RawRequest, DEFAULT_BODY_LIMIT};
use crate::observe::{EventSink, EventTags, InvocationContext, Outcome, TracingSink};
use crate::problem::{translate, IntoProblem};
use crate::response::{Dispatch, EmptyDispatcher, JsonDispatcher};
use crate::validation::{Validate, ValidationError};

/// Why a pipeline call did not produce a result.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError<E> {
    Bind(BindError),
    Validation(ValidationError),
    /// Returned by business logic; passed through untouched.
    Business(E),
}

impl<E> PipelineError<E> {
    /// Whether the failure happened before business logic ran.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Business(_))
    }
}

impl<E: fmt::Display> fmt::Display for PipelineError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "{}", e),
            Self::Validation(e) => write!(f, "{}", e),
            Self::Business(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for PipelineError<E> {}

fn bind_request<T, E>(raw: Result<RawRequest, BindError>) -> Result<T, PipelineError<E>>
where
    T: DeserializeOwned + Validate,
{
    let raw = raw.map_err(PipelineError::Bind)?;
    let mut request: T = bind(&raw).map_err(PipelineError::Bind)?;
    request.validate().map_err(PipelineError::Validation)?;
    Ok(request)
}

/// Run one call through the pipeline.
///
/// Exactly one event reaches `sink`. Business logic runs only when binding
/// and validation succeed, and every failure is returned as produced.
pub async fn run<S, T, R, E, F, Fut, D>(
    sink: &dyn EventSink,
    raw: Result<RawRequest, BindError>,
    call: Call<S>,
    handler: F,
    dispatcher: &D,
) -> Result<Response, PipelineError<E>>
where
    T: DeserializeOwned + Validate,
    E: fmt::Display,
    F: FnOnce(Call<S>, T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    D: Dispatch<R>,
{
    let ctx = InvocationContext::new(EventTags {
        operation: dispatcher.label(),
        method: call.method.clone(),
        path: call.path.clone(),
        route: call.route.clone(),
        request_id: call.request_id.clone(),
    });
    let mut recorder = ctx.recorder();

    let bound = recorder.span().in_scope(|| bind_request::<T, E>(raw));
    recorder.validated();

    let request = match bound {
        Ok(request) => request,
        Err(err) => {
            let span = recorder.span().clone();
            let event = recorder.finish(Outcome::ValidationFailed, Some(err.to_string()));
            span.in_scope(|| sink.emit(&event));
            return Err(err);
        }
    };

    let span = recorder.span().clone();
    recorder.handler_started();
    let result = handler(call, request).instrument(span.clone()).await;
    recorder.handler_finished();

    match result {
        Ok(value) => {
            let response = dispatcher.dispatch(value);
            let event = recorder.finish(Outcome::Completed, None);
            span.in_scope(|| sink.emit(&event));
            Ok(response)
        }
        Err(err) => {
            let event = recorder.finish(Outcome::HandlerFailed, Some(err.to_string()));
            span.in_scope(|| sink.emit(&event));
            Err(PipelineError::Business(err))
        }
    }
}

/// Registration surface for pipeline-backed endpoints.
///
/// Modules receive a `Pipeline` explicitly when their router is built.
#[derive(Clone)]
pub struct Pipeline {
    sink: Arc<dyn EventSink>,
    body_limit: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Cap on buffered request bodies, in bytes.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    /// Endpoint whose result is serialized as JSON with `status`.
    ///
    /// The request type is the second parameter of `handler`.
    pub fn handle<S, F, Fut, Req, Res, E>(
        &self,
        handler: F,
        status: StatusCode,
    ) -> Endpoint<F, Req, JsonDispatcher>
    where
        F: Fn(Call<S>, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, E>> + Send + 'static,
        Req: DeserializeOwned + Validate + Send + 'static,
        Res: serde::Serialize + Send + 'static,
        E: IntoProblem + fmt::Display + Send + 'static,
    {
        self.endpoint(handler, JsonDispatcher::new(status))
    }

    /// Endpoint that answers with `status` and no body.
    pub fn handle_no_content<S, F, Fut, Req, E>(
        &self,
        handler: F,
        status: StatusCode,
    ) -> Endpoint<F, Req, EmptyDispatcher>
    where
        F: Fn(Call<S>, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        Req: DeserializeOwned + Validate + Send + 'static,
        E: IntoProblem + fmt::Display + Send + 'static,
    {
        self.endpoint(handler, EmptyDispatcher::new(status))
    }

    fn endpoint<F, Req, D>(&self, handler: F, dispatcher: D) -> Endpoint<F, Req, D> {
        Endpoint {
            pipeline: self.clone(),
            handler,
            dispatcher,
            marker: PhantomData,
        }
    }
}

/// An axum handler produced by [`Pipeline::handle`] or
/// [`Pipeline::handle_no_content`].
pub struct Endpoint<F, Req, D> {
    pipeline: Pipeline,
    handler: F,
    dispatcher: D,
    marker: PhantomData<fn() -> Req>,
}

impl<F: Clone, Req, D: Clone> Clone for Endpoint<F, Req, D> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            handler: self.handler.clone(),
            dispatcher: self.dispatcher.clone(),
            marker: PhantomData,
        }
    }
}

/// Handler marker for pipeline endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EndpointMarker;

impl<S, F, Fut, Req, Res, E, D> Handler<EndpointMarker, S> for Endpoint<F, Req, D>
where
    S: Clone + Send + Sync + 'static,
    F: Fn(Call<S>, Req) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, E>> + Send + 'static,
    Req: DeserializeOwned + Validate + Send + 'static,
    Res: Send + 'static,
    E: IntoProblem + fmt::Display + Send + 'static,
    D: Dispatch<Res>,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request<Body>, state: S) -> Self::Future {
        Box::pin(async move {
            let (call, raw) = split_request(req, state, self.pipeline.body_limit).await;
            let request_id = call.request_id.clone();

            match run(
                self.pipeline.sink.as_ref(),
                raw,
                call,
                self.handler,
                &self.dispatcher,
            )
            .await
            {
                Ok(response) => response,
                Err(err) => translate(&err, request_id.as_str()).into_response(),
            }
        })
    }
}
