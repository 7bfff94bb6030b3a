//! Binding raw transport data onto typed request values.
//!
//! `GET`, `HEAD` and `DELETE` requests bind from the query string and the
//! path parameters; textual values are coerced into the field's declared
//! type. Every other method binds from the JSON body plus the path
//! parameters. Path parameters always win over a key with the same name.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, MatchedPath, RawPathParams};
use axum::http::{request::Parts, HeaderMap, Method, Request, Uri};
use serde::de::{self, DeserializeOwned, Deserializer, Unexpected, Visitor};
use serde_json::{Map, Value};

use crate::middleware::{extract_or_generate_request_id, RequestId};

/// Default upper bound for buffered request bodies.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Raw input could not be coerced into the request's typed shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The body could not be read from the transport.
    Read(String),
    /// The query string is not valid form encoding.
    Query(String),
    /// A path or query value does not fit the declared field type.
    Params(String),
    /// The body is not valid JSON for the request type.
    Body(String),
    /// The body is valid JSON but not an object.
    NotAnObject,
}

impl std::fmt::Display for BindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(e) => write!(f, "failed to read request body: {}", e),
            Self::Query(e) => write!(f, "malformed query string: {}", e),
            Self::Params(e) => write!(f, "invalid request parameters: {}", e),
            Self::Body(e) => write!(f, "malformed request body: {}", e),
            Self::NotAnObject => write!(f, "request body must be a JSON object"),
        }
    }
}

impl std::error::Error for BindError {}

/// Transport-level view of one call, gathered before binding.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub method: Method,
    pub uri: Uri,
    pub path_params: Vec<(String, String)>,
    pub body: Bytes,
}

impl RawRequest {
    /// Raw request without path parameters or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            path_params: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Whether this method carries its input in the body.
    pub fn binds_body(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
    }
}

/// Per-call metadata handed to business logic alongside the validated request.
#[derive(Debug, Clone)]
pub struct Call<S> {
    pub state: S,
    pub request_id: RequestId,
    pub method: Method,
    /// Request path as seen by the module router (prefix already removed).
    pub path: String,
    /// Matched route pattern, or the path when no pattern is available.
    pub route: String,
    pub headers: HeaderMap,
}

/// Split an axum request into the call metadata for business logic and the
/// raw input for binding. A body that cannot be read is reported as a
/// binding failure so the pipeline records it like any other.
pub async fn split_request<S>(
    req: Request<Body>,
    state: S,
    body_limit: usize,
) -> (Call<S>, Result<RawRequest, BindError>)
where
    S: Send + Sync,
{
    let (mut parts, body) = req.into_parts();
    let path_params = path_params(&mut parts, &state).await;

    let request_id = parts
        .extensions
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| extract_or_generate_request_id(&parts.headers));
    let path = parts.uri.path().to_string();
    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let raw = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|e| BindError::Read(e.to_string()))
        .map(|body| RawRequest {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            path_params,
            body,
        });

    let call = Call {
        state,
        request_id,
        method: parts.method,
        path,
        route,
        headers: parts.headers,
    };
    (call, raw)
}

async fn path_params<S: Send + Sync>(parts: &mut Parts, state: &S) -> Vec<(String, String)> {
    // Routes without parameters have nothing to bind.
    match RawPathParams::from_request_parts(parts, state).await {
        Ok(params) => params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Bind `raw` onto a fresh `T`.
pub fn bind<T: DeserializeOwned>(raw: &RawRequest) -> Result<T, BindError> {
    if raw.binds_body() {
        bind_body(raw)
    } else {
        bind_params(raw)
    }
}

fn bind_params<T: DeserializeOwned>(raw: &RawRequest) -> Result<T, BindError> {
    let query = raw.uri.query().unwrap_or_default();
    let parsed: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(|e| BindError::Query(e.to_string()))?;

    // First occurrence of a repeated key wins.
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(parsed.len());
    for (name, value) in parsed {
        if !pairs.iter().any(|(k, _)| *k == name) {
            pairs.push((name, value));
        }
    }

    for (name, value) in &raw.path_params {
        pairs.retain(|(k, _)| k != name);
        pairs.push((name.clone(), value.clone()));
    }

    let encoded =
        serde_urlencoded::to_string(&pairs).map_err(|e| BindError::Params(e.to_string()))?;
    serde_urlencoded::from_str(&encoded).map_err(|e| BindError::Params(e.to_string()))
}

fn bind_body<T: DeserializeOwned>(raw: &RawRequest) -> Result<T, BindError> {
    let mut object = if raw.body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(&raw.body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(BindError::NotAnObject),
            Err(e) => return Err(BindError::Body(e.to_string())),
        }
    };

    for (name, value) in &raw.path_params {
        object.insert(name.clone(), Value::String(value.clone()));
    }

    serde_json::from_value(Value::Object(object)).map_err(|e| BindError::Body(e.to_string()))
}

/// Deserialize an optional flag from `true`/`false` or a textual spelling:
/// `1`, `t`, `T`, `TRUE`, `true`, `True` and their `0`/`f`/`false` forms.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_flag")]`.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a boolean such as true, false, 1 or 0")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            match v {
                "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(Some(true)),
                "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(Some(false)),
                _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
            }
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }
    }

    deserializer.deserialize_option(FlagVisitor)
}
