//! Per-request source data handed to the decoder by the transport layer.

use http::header::{HeaderName, IntoHeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum inline path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Ordered key/value parameters. Keys are `Arc<str>` since route and query
/// names repeat across requests.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Structural format of the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

impl BodyFormat {
    /// Map a `Content-Type` value to a body format. Parameters such as
    /// `charset` are ignored; unknown media types yield `None`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if media == "application/json" || media.ends_with("+json") {
            Some(BodyFormat::Json)
        } else if media == "application/x-www-form-urlencoded" {
            Some(BodyFormat::Form)
        } else {
            None
        }
    }
}

impl std::str::FromStr for BodyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(BodyFormat::Json),
            "form" => Ok(BodyFormat::Form),
            other => Err(format!("unknown body format: {other}")),
        }
    }
}

/// Path, query, header and body data of one request.
///
/// Built fresh per request and never shared; the decoder only reads it.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl SourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a bundle from request head parts, the router's path
    /// parameters and the already-read body. The query string is taken from
    /// the request URI.
    pub fn from_parts(parts: &http::request::Parts, path_params: ParamVec, body: Vec<u8>) -> Self {
        let bundle = SourceBundle {
            path_params,
            query_params: ParamVec::new(),
            headers: parts.headers.clone(),
            body,
        };
        match parts.uri.query() {
            Some(query) => bundle.with_query_string(query),
            None => bundle,
        }
    }

    pub fn with_path_param(mut self, key: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        self.path_params.push((key.into(), value.into()));
        self
    }

    pub fn with_query_param(mut self, key: impl Into<Arc<str>>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Append every pair of a form-urlencoded query string. A leading `?` is
    /// ignored.
    pub fn with_query_string(mut self, query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        self.query_params.extend(
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned())),
        );
        self
    }

    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and its content type.
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body.to_string())
    }

    /// Value of a path parameter. The last occurrence wins.
    pub fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a query parameter, in request order.
    pub fn query_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query_params
            .iter()
            .filter(move |(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        HeaderName::from_bytes(name.as_bytes())
            .ok()
            .and_then(|name| self.headers.get(name))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body format declared by `Content-Type`, if recognized.
    pub fn body_format(&self) -> Option<BodyFormat> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(BodyFormat::from_content_type)
    }
}
