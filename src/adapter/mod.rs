//! Handler-shape adapter.
//!
//! A business handler is written in one of four shapes (see [`ShapeKind`]).
//! [`Binder::adapt`] classifies it once, compiles the record shape of its
//! input, and returns a [`BoundHandler`] that runs decode, defaults,
//! validation and the handler itself per request, handing the outcome to a
//! [`ResponseEmitter`].
//!
//! ```
//! use formbind::{Binder, RequestContext, SourceBundle};
//! use http::Method;
//!
//! fn health(_ctx: &RequestContext) -> anyhow::Result<()> {
//!     Ok(())
//! }
//!
//! let bound = Binder::new().adapt(health).unwrap();
//! let ctx = RequestContext::new(Method::GET, "/health", "health");
//! let response = bound.handle(&ctx, &SourceBundle::new());
//! assert_eq!(response.status, http::StatusCode::OK);
//! ```

mod binder;
mod emitter;
mod handler;
mod signature;
mod validator;

pub use binder::{Binder, BoundHandler, Phase};
pub use emitter::{JsonEmitter, JsonResponse, ResponseEmitter};
pub use handler::{HandlerShape, IntoHandler, NoInput};
pub use signature::{OutputKind, ParamKind, ShapeKind, Signature};
pub use validator::{typed, RecordRef, ValidationError, Validator};
