//! Path-rewriting adapter placed in front of each module router.

use std::task::{Context, Poll};

use http::uri::{PathAndQuery, Uri};
use http::Request;
use tower::Service;

/// Remove `prefix` from `path`.
///
/// Only whole segments are removed: `/todo` strips `/todo` and `/todo/x`
/// but not `/todolist`. An empty remainder becomes `/`. The root prefix
/// leaves the path untouched.
///
/// ```
/// use modgate_gateway::strip_prefix;
///
/// assert_eq!(strip_prefix("/todo", "/todo/tasks/42"), "/tasks/42");
/// assert_eq!(strip_prefix("/todo", "/todo"), "/");
/// ```
pub fn strip_prefix(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        return if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        };
    }
    let rest = match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

/// Replace the path of `uri`, keeping its query string.
pub(crate) fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// Service that strips a mount prefix before delegating to `inner`.
#[derive(Debug, Clone)]
pub struct StripPrefix<S> {
    prefix: String,
    inner: S,
}

impl<S> StripPrefix<S> {
    pub fn new(prefix: impl Into<String>, inner: S) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<S, B> Service<Request<B>> for StripPrefix<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let path = strip_prefix(&self.prefix, req.uri().path());
        match with_path(req.uri(), &path) {
            Some(uri) => *req.uri_mut() = uri,
            None => tracing::warn!(
                prefix = %self.prefix,
                uri = %req.uri(),
                "could not rewrite request path, forwarding unchanged"
            ),
        }
        self.inner.call(req)
    }
}
