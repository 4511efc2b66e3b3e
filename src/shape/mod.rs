//! Record shapes: the per-type binding plan built once at registration.
//!
//! A [`Record`](crate::Record) describes its fields to a [`ShapeBuilder`];
//! [`RecordShape::build`] resolves each field's source by tag precedence
//! (path, header, query, embedded, body), flattens embedded records in place
//! and rejects tags the decoder cannot honor. The resulting shape is immutable
//! and shared by every request that decodes into the record.
//!
//! ```
//! use formbind::shape::{RecordShape, ShapeBuilder, SourceKind};
//! use formbind::Record;
//! use serde::Deserialize;
//!
//! #[derive(Default, Deserialize)]
//! #[serde(default)]
//! struct GetUser {
//!     id: u64,
//!     verbose: bool,
//! }
//!
//! impl Record for GetUser {
//!     fn describe(shape: &mut ShapeBuilder<Self>) {
//!         shape.field::<u64>("id", |r| &mut r.id).path("id");
//!         shape.field::<bool>("verbose", |r| &mut r.verbose).query("verbose").default("false");
//!     }
//! }
//!
//! let shape = RecordShape::<GetUser>::build().unwrap();
//! assert_eq!(shape.descriptors()[0].source, SourceKind::Path);
//! ```

mod builder;
mod descriptor;
mod slot;

pub use builder::{FieldTags, RecordShape, ShapeBuilder};
pub use descriptor::{Cardinality, FieldDescriptor, SourceKind};
pub use slot::{Embedded, FieldType, Scalar, Slot};
