use http::{HeaderMap, Method};
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Header carrying an upstream correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID correlating a bound handler invocation with its log lines.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    pub(crate) fn generate() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse the id in [`REQUEST_ID_HEADER`] when it is a valid ULID,
    /// otherwise generate one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Self::generate)
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

/// Per-request metadata handed to every handler.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    #[serde(serialize_with = "serialize_display")]
    pub request_id: RequestId,
    #[serde(serialize_with = "serialize_display")]
    pub method: Method,
    pub path: String,
    /// Name the handler was registered under
    pub handler_name: String,
}

fn serialize_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, handler_name: impl Into<String>) -> Self {
        RequestContext {
            request_id: RequestId::generate(),
            method,
            path: path.into(),
            handler_name: handler_name.into(),
        }
    }

    /// Build a context from request head parts, reusing an `x-request-id`
    /// header when it carries a valid ULID.
    pub fn from_parts(parts: &http::request::Parts, handler_name: impl Into<String>) -> Self {
        RequestContext {
            request_id: RequestId::from_headers(&parts.headers),
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            handler_name: handler_name.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}
