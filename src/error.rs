//! Error taxonomy.
//!
//! - [`ShapeError`]: a handler or record shape is not supported. Raised at
//!   registration only.
//! - [`DecodingError`]: a request could not be decoded into its record. Wraps
//!   [`CoercionError`](crate::coerce::CoercionError) for per-field failures.
//! - [`Failure`]: the terminal error of one invocation, handed to the
//!   [`ResponseEmitter`](crate::adapter::ResponseEmitter).

use crate::adapter::{Phase, ValidationError};
use crate::coerce::{CoercionError, TargetType};
use crate::shape::SourceKind;
use std::fmt;

/// A handler or record does not match a supported shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The candidate is not a function.
    NotCallable { candidate: &'static str },
    NoParameters,
    TooManyParameters { count: usize },
    FirstParameterNotContext { found: &'static str },
    SecondParameterNotRecord { found: &'static str },
    NoOutputs,
    TooManyOutputs { count: usize },
    SingleOutputNotOutcome { found: &'static str },
    SecondOutputNotOutcome { found: &'static str },
    /// A path/query/header tag on a type the coercer cannot produce.
    UnsupportedSourceType {
        record: &'static str,
        field: &'static str,
        source: SourceKind,
        target: TargetType,
    },
    /// A repeated (`Vec`) field bound to a path segment or header.
    RepeatedSource {
        record: &'static str,
        field: &'static str,
        source: SourceKind,
    },
    /// A `default` tag on a field the decoder cannot write.
    UnsupportedDefault {
        record: &'static str,
        field: &'static str,
        target: TargetType,
    },
    /// A record embeds itself, directly or through another record.
    RecursiveEmbedding {
        record: &'static str,
        embedded: &'static str,
    },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::NotCallable { candidate } => {
                write!(f, "input must be a function, got {candidate}")
            }
            ShapeError::NoParameters => write!(f, "function must have at least one parameter"),
            ShapeError::TooManyParameters { count } => {
                write!(f, "function can have at most 2 parameters, got {count}")
            }
            ShapeError::FirstParameterNotContext { found } => {
                write!(f, "first parameter must be the request context, got {found}")
            }
            ShapeError::SecondParameterNotRecord { found } => {
                write!(f, "second parameter must be a record type, got {found}")
            }
            ShapeError::NoOutputs => write!(f, "function must have at least one return value"),
            ShapeError::TooManyOutputs { count } => {
                write!(f, "function can have at most 2 return values, got {count}")
            }
            ShapeError::SingleOutputNotOutcome { found } => {
                write!(f, "single return value must be an outcome, got {found}")
            }
            ShapeError::SecondOutputNotOutcome { found } => {
                write!(f, "second return value must be an outcome, got {found}")
            }
            ShapeError::UnsupportedSourceType {
                record,
                field,
                source,
                target,
            } => write!(
                f,
                "field {record}.{field} has a {source} tag but its type {target} cannot be decoded from a string"
            ),
            ShapeError::RepeatedSource {
                record,
                field,
                source,
            } => write!(
                f,
                "field {record}.{field} is repeated; {source} sources bind a single value"
            ),
            ShapeError::UnsupportedDefault {
                record,
                field,
                target,
            } => write!(
                f,
                "field {record}.{field} has a default tag but its type {target} cannot hold a default"
            ),
            ShapeError::RecursiveEmbedding { record, embedded } => {
                write!(f, "record {record} embeds {embedded} recursively")
            }
        }
    }
}

impl std::error::Error for ShapeError {}

/// Decoding stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Path,
    Query,
    Header,
    Body,
    Default,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Path => write!(f, "path"),
            Stage::Query => write!(f, "query"),
            Stage::Header => write!(f, "header"),
            Stage::Body => write!(f, "body"),
            Stage::Default => write!(f, "default"),
        }
    }
}

impl From<SourceKind> for Stage {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Path => Stage::Path,
            SourceKind::Query => Stage::Query,
            SourceKind::Header => Stage::Header,
            SourceKind::Body | SourceKind::Embedded => Stage::Body,
        }
    }
}

/// Underlying reason for a [`DecodingError`].
#[derive(Debug)]
pub enum DecodeCause {
    Coercion(CoercionError),
    /// Header value is not visible ASCII.
    InvalidHeader(http::header::ToStrError),
    Json(serde_json::Error),
    Form(serde_urlencoded::de::Error),
    BodyTooLarge { limit: usize, actual: usize },
}

impl fmt::Display for DecodeCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeCause::Coercion(e) => write!(f, "{e}"),
            DecodeCause::InvalidHeader(e) => write!(f, "{e}"),
            DecodeCause::Json(e) => write!(f, "{e}"),
            DecodeCause::Form(e) => write!(f, "{e}"),
            DecodeCause::BodyTooLarge { limit, actual } => {
                write!(f, "body of {actual} bytes exceeds the {limit} byte limit")
            }
        }
    }
}

/// A request could not be decoded into its record.
#[derive(Debug)]
pub struct DecodingError {
    pub stage: Stage,
    /// Record field that failed, if the failure is tied to one.
    pub field: Option<&'static str>,
    /// Source key for path/query/header failures, default literal for the
    /// default stage.
    pub key: Option<&'static str>,
    pub cause: DecodeCause,
}

impl DecodingError {
    pub(crate) fn field(
        stage: Stage,
        field: &'static str,
        key: Option<&'static str>,
        cause: DecodeCause,
    ) -> Self {
        DecodingError {
            stage,
            field: Some(field),
            key,
            cause,
        }
    }

    pub(crate) fn body(cause: DecodeCause) -> Self {
        DecodingError {
            stage: Stage::Body,
            field: None,
            key: None,
            cause,
        }
    }

    /// The coercion failure behind this error, if any.
    #[must_use]
    pub fn coercion(&self) -> Option<&CoercionError> {
        match &self.cause {
            DecodeCause::Coercion(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key.unwrap_or_default();
        let field = self.field.unwrap_or_default();
        match self.stage {
            Stage::Path => write!(
                f,
                "failed to parse path parameter \"{key}\" (field {field}): {}",
                self.cause
            ),
            Stage::Query => write!(
                f,
                "failed to parse query parameter \"{key}\" (field {field}): {}",
                self.cause
            ),
            Stage::Header => write!(
                f,
                "failed to parse header \"{key}\" (field {field}): {}",
                self.cause
            ),
            Stage::Body => write!(f, "failed to decode request body: {}", self.cause),
            Stage::Default => write!(
                f,
                "failed to apply default value \"{key}\" to field {field}: {}",
                self.cause
            ),
        }
    }
}

impl std::error::Error for DecodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.cause {
            DecodeCause::Coercion(e) => Some(e),
            DecodeCause::InvalidHeader(e) => Some(e),
            DecodeCause::Json(e) => Some(e),
            DecodeCause::Form(e) => Some(e),
            DecodeCause::BodyTooLarge { .. } => None,
        }
    }
}

/// Terminal error of one handler invocation.
#[derive(Debug)]
pub enum Failure {
    Decode(DecodingError),
    /// Returned by the configured validator; the handler did not run.
    Validation(ValidationError),
    /// The business handler's own error, passed through unchanged.
    Handler(anyhow::Error),
}

impl Failure {
    /// Lifecycle phase the invocation was attempting when it failed.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Failure::Decode(e) if e.stage == Stage::Default => Phase::DefaultsApplied,
            Failure::Decode(_) => Phase::Decoded,
            Failure::Validation(_) => Phase::Validated,
            Failure::Handler(_) => Phase::Invoked,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Decode(e) => write!(f, "{e}"),
            Failure::Validation(e) => write!(f, "{e}"),
            Failure::Handler(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::Decode(e) => Some(e),
            Failure::Validation(e) => Some(e),
            Failure::Handler(e) => Some(e.as_ref()),
        }
    }
}
