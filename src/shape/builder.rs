use super::descriptor::{Cardinality, FieldDescriptor, SourceKind};
use super::slot::{Embedded, FieldType, Slot};
use crate::coerce::TargetType;
use crate::error::ShapeError;
use crate::Record;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Resolves a field of `R` to its storage.
trait Access<R>: Send + Sync {
    fn slot<'a>(&self, record: &'a mut R) -> &'a mut dyn Slot;

    /// Reset the field to zero without allocating unset embedded holders.
    fn reset(&self, record: &mut R);
}

/// A field declared directly on `R`.
struct Direct<R, T> {
    access: fn(&mut R) -> &mut T,
}

impl<R: 'static, T: Slot + 'static> Access<R> for Direct<R, T> {
    fn slot<'a>(&self, record: &'a mut R) -> &'a mut dyn Slot {
        (self.access)(record)
    }

    fn reset(&self, record: &mut R) {
        (self.access)(record).clear();
    }
}

/// A field of embedded record `E`, reached through holder `H` on parent `P`.
struct Nested<P, H, E> {
    outer: fn(&mut P) -> &mut H,
    inner: Arc<dyn Access<E>>,
    _embedded: PhantomData<fn() -> E>,
}

impl<P: 'static, H: Embedded<E>, E: Record> Access<P> for Nested<P, H, E> {
    fn slot<'a>(&self, record: &'a mut P) -> &'a mut dyn Slot {
        self.inner.slot((self.outer)(record).materialize())
    }

    fn reset(&self, record: &mut P) {
        if let Some(embedded) = (self.outer)(record).existing() {
            self.inner.reset(embedded);
        }
    }
}

/// Raw tags attached to a field before source resolution.
#[derive(Debug, Clone, Default)]
struct Tags {
    path: Option<&'static str>,
    query: Option<&'static str>,
    header: Option<&'static str>,
    body: Option<&'static str>,
    default: Option<&'static str>,
    validate: Option<&'static str>,
    embedded: bool,
}

impl Tags {
    fn from_resolved(descriptor: &FieldDescriptor) -> Self {
        let mut tags = Tags {
            default: descriptor.default,
            validate: descriptor.validate,
            ..Tags::default()
        };
        match descriptor.source {
            SourceKind::Path => tags.path = descriptor.key,
            SourceKind::Query => tags.query = descriptor.key,
            SourceKind::Header => tags.header = descriptor.key,
            SourceKind::Body => tags.body = descriptor.key,
            SourceKind::Embedded => tags.embedded = true,
        }
        tags
    }

    /// Source precedence: path, header, query, embedded, body.
    fn resolve(&self, name: &'static str) -> (SourceKind, Option<&'static str>) {
        if let Some(key) = self.path {
            (SourceKind::Path, Some(key))
        } else if let Some(key) = self.header {
            (SourceKind::Header, Some(key))
        } else if let Some(key) = self.query {
            (SourceKind::Query, Some(key))
        } else if self.embedded {
            (SourceKind::Embedded, None)
        } else {
            (SourceKind::Body, Some(self.body.unwrap_or(name)))
        }
    }
}

struct PendingField<R> {
    name: &'static str,
    /// Field names leading to this field in the body document, outermost first.
    path: Vec<&'static str>,
    owner: &'static str,
    tags: Tags,
    target: TargetType,
    cardinality: Cardinality,
    access: Option<Arc<dyn Access<R>>>,
}

/// Tag setters for the field just declared on a [`ShapeBuilder`].
pub struct FieldTags<'a> {
    tags: &'a mut Tags,
}

impl FieldTags<'_> {
    /// Bind from a named path segment.
    pub fn path(self, key: &'static str) -> Self {
        self.tags.path = Some(key);
        self
    }

    /// Bind from a named query parameter.
    pub fn query(self, key: &'static str) -> Self {
        self.tags.query = Some(key);
        self
    }

    /// Alias of [`FieldTags::query`].
    pub fn form(self, key: &'static str) -> Self {
        self.query(key)
    }

    /// Bind from a named header (case-insensitive).
    pub fn header(self, key: &'static str) -> Self {
        self.tags.header = Some(key);
        self
    }

    /// Key of the field in the body document. Descriptive only; the body is
    /// decoded by the record's `Deserialize` impl.
    pub fn body(self, key: &'static str) -> Self {
        self.tags.body = Some(key);
        self
    }

    pub fn default(self, literal: &'static str) -> Self {
        self.tags.default = Some(literal);
        self
    }

    pub fn validate(self, rule: &'static str) -> Self {
        self.tags.validate = Some(rule);
        self
    }
}

/// Collects the fields of record `R` inside [`Record::describe`].
///
/// Errors are recorded rather than returned so `describe` stays infallible;
/// the first one surfaces from [`RecordShape::build`].
pub struct ShapeBuilder<R> {
    record: &'static str,
    ancestors: Vec<&'static str>,
    pending: Vec<PendingField<R>>,
    error: Option<ShapeError>,
}

impl<R: Record> ShapeBuilder<R> {
    fn new(ancestors: Vec<&'static str>) -> Self {
        ShapeBuilder {
            record: type_name::<R>(),
            ancestors,
            pending: Vec::new(),
            error: None,
        }
    }

    fn push(&mut self, field: PendingField<R>) -> FieldTags<'_> {
        self.pending.push(field);
        let index = self.pending.len() - 1;
        FieldTags {
            tags: &mut self.pending[index].tags,
        }
    }

    /// Declare a field the decoder can write: a scalar, `Option` of a scalar or
    /// `Vec` of a scalar.
    pub fn field<T>(&mut self, name: &'static str, access: fn(&mut R) -> &mut T) -> FieldTags<'_>
    where
        T: Slot + FieldType + 'static,
    {
        let owner = self.record;
        self.push(PendingField {
            name,
            path: vec![name],
            owner,
            tags: Tags::default(),
            target: T::TARGET,
            cardinality: T::CARDINALITY,
            access: Some(Arc::new(Direct { access })),
        })
    }

    /// Declare a field only the body can fill (nested documents, maps, ...).
    ///
    /// Source tags other than `body` on such a field fail the build.
    pub fn opaque<T: ?Sized>(&mut self, name: &'static str) -> FieldTags<'_> {
        let owner = self.record;
        self.push(PendingField {
            name,
            path: vec![name],
            owner,
            tags: Tags::default(),
            target: TargetType::Unsupported(type_name::<T>()),
            cardinality: Cardinality::One,
            access: None,
        })
    }

    /// Flatten the fields of embedded record `E`, held in `H`, into this shape.
    pub fn embed<E, H>(&mut self, name: &'static str, access: fn(&mut R) -> &mut H)
    where
        E: Record,
        H: Embedded<E>,
    {
        if self.error.is_some() {
            return;
        }
        let embedded = type_name::<E>();
        if embedded == self.record || self.ancestors.contains(&embedded) {
            self.error = Some(ShapeError::RecursiveEmbedding {
                record: self.record,
                embedded,
            });
            return;
        }

        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.record);
        let inner = match RecordShape::<E>::build_nested(ancestors) {
            Ok(inner) => inner,
            Err(e) => {
                self.error = Some(e);
                return;
            }
        };

        let owner = self.record;
        self.push(PendingField {
            name,
            path: vec![name],
            owner,
            tags: Tags {
                embedded: true,
                ..Tags::default()
            },
            target: TargetType::Unsupported(embedded),
            cardinality: if H::OPTIONAL {
                Cardinality::Optional
            } else {
                Cardinality::One
            },
            access: None,
        });

        let fields = inner
            .descriptors
            .into_iter()
            .zip(inner.access)
            .zip(inner.paths);
        for ((descriptor, slot), inner_path) in fields {
            let mut path = Vec::with_capacity(inner_path.len() + 1);
            path.push(name);
            path.extend(inner_path);
            let access = slot.map(|inner| {
                Arc::new(Nested::<R, H, E> {
                    outer: access,
                    inner,
                    _embedded: PhantomData,
                }) as Arc<dyn Access<R>>
            });
            self.pending.push(PendingField {
                name: descriptor.name,
                path,
                owner: descriptor.owner,
                tags: Tags::from_resolved(&descriptor),
                target: descriptor.target,
                cardinality: descriptor.cardinality,
                access,
            });
        }
    }

    fn finish(self) -> Result<RecordShape<R>, ShapeError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mut descriptors = Vec::with_capacity(self.pending.len());
        let mut access = Vec::with_capacity(self.pending.len());
        let mut paths = Vec::with_capacity(self.pending.len());
        let mut has_query = false;
        let mut has_header = false;

        for field in self.pending {
            let (source, key) = field.tags.resolve(field.name);
            if matches!(
                source,
                SourceKind::Path | SourceKind::Query | SourceKind::Header
            ) {
                if field.access.is_none() || !field.target.is_supported() {
                    return Err(ShapeError::UnsupportedSourceType {
                        record: field.owner,
                        field: field.name,
                        source,
                        target: field.target,
                    });
                }
                if field.cardinality == Cardinality::Many && source != SourceKind::Query {
                    return Err(ShapeError::RepeatedSource {
                        record: field.owner,
                        field: field.name,
                        source,
                    });
                }
            }
            if field.tags.default.is_some() && field.access.is_none() {
                return Err(ShapeError::UnsupportedDefault {
                    record: field.owner,
                    field: field.name,
                    target: field.target,
                });
            }

            has_query |= source == SourceKind::Query;
            has_header |= source == SourceKind::Header;
            descriptors.push(FieldDescriptor {
                name: field.name,
                owner: field.owner,
                source,
                key,
                target: field.target,
                cardinality: field.cardinality,
                default: field.tags.default,
                validate: field.tags.validate,
            });
            access.push(field.access);
            paths.push(field.path);
        }

        Ok(RecordShape {
            type_name: self.record,
            descriptors,
            access,
            paths,
            has_query,
            has_header,
        })
    }
}

/// The compiled, immutable binding plan of record `R`.
///
/// Embedded records are flattened in place: the descriptor list holds a marker
/// for the embedding field followed by the embedded record's own fields.
pub struct RecordShape<R> {
    type_name: &'static str,
    descriptors: Vec<FieldDescriptor>,
    access: Vec<Option<Arc<dyn Access<R>>>>,
    paths: Vec<Vec<&'static str>>,
    has_query: bool,
    has_header: bool,
}

impl<R: Record> RecordShape<R> {
    /// Inspect `R` once and compile its field descriptors.
    ///
    /// # Errors
    ///
    /// Returns a [`ShapeError`] if a source tag sits on a type the coercer
    /// cannot produce, a repeated field is bound to a path or header, a default
    /// is declared on a field the decoder cannot write, or records embed each
    /// other recursively.
    pub fn build() -> Result<Self, ShapeError> {
        Self::build_nested(Vec::new())
    }

    fn build_nested(ancestors: Vec<&'static str>) -> Result<Self, ShapeError> {
        let mut builder = ShapeBuilder::<R>::new(ancestors);
        R::describe(&mut builder);
        builder.finish()
    }
}

impl<R> RecordShape<R> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Look up a descriptor by field name.
    pub fn descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub(crate) fn has_query(&self) -> bool {
        self.has_query
    }

    pub(crate) fn has_header(&self) -> bool {
        self.has_header
    }

    /// Document paths of the fields written from path, query or header
    /// sources. The body stage must leave these alone.
    pub(crate) fn keyed_paths(&self) -> impl Iterator<Item = &[&'static str]> + '_ {
        self.descriptors
            .iter()
            .zip(&self.paths)
            .filter(|(d, _)| d.is_keyed())
            .map(|(_, path)| path.as_slice())
    }

    /// Zero every keyed field, leaving unset embedded holders unset.
    pub(crate) fn reset_keyed(&self, record: &mut R) {
        for (descriptor, access) in self.descriptors.iter().zip(&self.access) {
            if let (true, Some(access)) = (descriptor.is_keyed(), access) {
                access.reset(record);
            }
        }
    }

    /// Storage for the descriptor at `index`, allocating optional embedded
    /// holders on the way. `None` for body-only fields and embedding markers.
    pub(crate) fn slot<'a>(&self, index: usize, record: &'a mut R) -> Option<&'a mut dyn Slot> {
        match self.access.get(index) {
            Some(Some(access)) => Some(access.slot(record)),
            _ => None,
        }
    }
}

impl<R> fmt::Debug for RecordShape<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordShape")
            .field("type_name", &self.type_name)
            .field("descriptors", &self.descriptors)
            .field("has_query", &self.has_query)
            .field("has_header", &self.has_header)
            .finish()
    }
}
