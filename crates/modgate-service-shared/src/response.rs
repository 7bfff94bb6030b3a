//! Response dispatchers for the two result shapes an endpoint can declare.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Turns a successful business result into an HTTP response.
///
/// Chosen once, at registration time.
pub trait Dispatch<T>: Clone + Send + Sync + 'static {
    /// Observability label for endpoints using this dispatcher.
    fn label(&self) -> &'static str;

    fn dispatch(&self, result: T) -> Response;
}

/// Serializes the result as JSON with a fixed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonDispatcher {
    pub status: StatusCode,
}

impl JsonDispatcher {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

impl<T: Serialize> Dispatch<T> for JsonDispatcher {
    fn label(&self) -> &'static str {
        "handler"
    }

    fn dispatch(&self, result: T) -> Response {
        (self.status, Json(result)).into_response()
    }
}

/// Writes only a status line, no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyDispatcher {
    pub status: StatusCode,
}

impl EmptyDispatcher {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

impl Dispatch<()> for EmptyDispatcher {
    fn label(&self) -> &'static str {
        "handler_no_content"
    }

    fn dispatch(&self, _: ()) -> Response {
        self.status.into_response()
    }
}
