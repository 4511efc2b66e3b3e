//! # formbind
//!
//! **formbind** decodes HTTP request data into typed records declared with
//! per-field source tags, and adapts plain Rust functions written in a small
//! set of call shapes into one uniform request handler.
//!
//! ## Overview
//!
//! A request arrives at the transport layer (not part of this crate) as a
//! path, a query string, headers and a body. The transport collects them into
//! a [`SourceBundle`]; formbind does the rest:
//!
//! 1. **Decode**: every field of the handler's input record is resolved from
//!    the source its tag names, with string values coerced into the field's
//!    type.
//! 2. **Defaults**: fields still at their zero value receive their `default`
//!    literal.
//! 3. **Validate**: an optional [`Validator`] inspects the record.
//! 4. **Invoke**: the business handler runs with the context and the record.
//! 5. **Emit**: the outcome is handed to a [`ResponseEmitter`] exactly once.
//!
//! ## Architecture
//!
//! - **[`coerce`]** - string to scalar/temporal coercion
//! - **[`shape`]** - per-record field descriptors, built once
//! - **[`mod@decode`]** - the path → query → header → body pipeline
//! - **[`defaults`]** - post-decode default application
//! - **[`adapter`]** - handler shapes, binder, validator and emitter seams
//! - **[`registry`]** - named handlers for a transport to dispatch to
//! - **[`config`]** / **[`logging`]** - binder settings and tracing setup
//!
//! ## Declaring a record
//!
//! ```
//! use formbind::{Binder, Record, RequestContext, SourceBundle};
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Deserialize, Record)]
//! #[serde(default)]
//! pub struct CreateUser {
//!     #[bind(path = "org")]
//!     pub org: u32,
//!     #[bind(body = "name", default = "anonymous")]
//!     pub name: String,
//!     #[bind(header = "X-Dry-Run")]
//!     pub dry_run: Option<bool>,
//! }
//!
//! #[derive(Serialize)]
//! struct Created {
//!     org: u32,
//!     name: String,
//! }
//!
//! fn create_user(_ctx: &RequestContext, input: CreateUser) -> anyhow::Result<Created> {
//!     Ok(Created { org: input.org, name: input.name })
//! }
//!
//! let handler = Binder::new().adapt(create_user).unwrap();
//! let bundle = SourceBundle::new()
//!     .with_path_param("org", "7")
//!     .with_body("{}");
//! let ctx = RequestContext::new(Method::POST, "/orgs/7/users", "create_user");
//!
//! let response = handler.handle(&ctx, &bundle);
//! assert_eq!(response.body["data"]["name"], "anonymous");
//! ```
//!
//! ## Zero values
//!
//! A default is applied when the field equals its type's zero value after
//! decoding. An explicit zero in the request (`"age": 0`) is therefore
//! replaced by the default too; use an `Option` field when the difference
//! matters.

// Lets `#[derive(Record)]` expand to `::formbind::...` paths inside this crate.
extern crate self as formbind;

pub mod adapter;
pub mod bundle;
pub mod coerce;
pub mod config;
pub mod context;
pub mod decode;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod registry;
pub mod shape;

pub use adapter::{
    Binder, BoundHandler, IntoHandler, JsonEmitter, JsonResponse, NoInput, ResponseEmitter,
    ShapeKind, Signature, ValidationError, Validator,
};
pub use bundle::{BodyFormat, ParamVec, SourceBundle};
pub use coerce::{coerce, CoercionError, TargetType, Value};
pub use config::BinderConfig;
pub use context::{RequestContext, RequestId};
pub use decode::decode;
pub use defaults::apply_defaults;
pub use error::{DecodeCause, DecodingError, Failure, ShapeError, Stage};
pub use registry::{Registry, RegistrationError};
pub use shape::{FieldDescriptor, RecordShape, ShapeBuilder, SourceKind};

#[cfg(feature = "derive")]
pub use formbind_macros::Record;

use serde::de::DeserializeOwned;

/// A request input type whose fields are bound from tagged sources.
///
/// Usually derived with `#[derive(Record)]`; a manual implementation
/// describes each field to the [`ShapeBuilder`]:
///
/// ```
/// use formbind::{Record, RecordShape, ShapeBuilder};
/// use serde::Deserialize;
///
/// #[derive(Default, Deserialize)]
/// #[serde(default)]
/// struct Search {
///     q: String,
///     limit: Option<u16>,
/// }
///
/// impl Record for Search {
///     fn describe(shape: &mut ShapeBuilder<Self>) {
///         shape.field::<String>("q", |r| &mut r.q).query("q");
///         shape.field::<Option<u16>>("limit", |r| &mut r.limit).query("limit").default("20");
///     }
/// }
///
/// assert_eq!(RecordShape::<Search>::build().unwrap().descriptors().len(), 2);
/// ```
///
/// The body stage deserializes the whole record with serde, so body keys
/// follow the type's `Deserialize` impl (`#[serde(rename)]`,
/// `#[serde(flatten)]` for embedded records, `#[serde(default)]` for optional
/// keys).
pub trait Record: DeserializeOwned + Default + Send + 'static {
    /// Declare every bindable field, in declaration order.
    fn describe(shape: &mut ShapeBuilder<Self>);

    /// Reset fields that are not externally visible, so the decoder never
    /// writes them. Called after the body stage.
    fn clear_hidden(&mut self) {}
}
