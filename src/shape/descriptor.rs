use crate::coerce::TargetType;
use std::fmt;

/// Where a field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Path,
    Query,
    Header,
    /// Decoded as part of the whole-record body document.
    Body,
    /// An embedded record whose fields are flattened into the parent.
    Embedded,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Path => write!(f, "path"),
            SourceKind::Query => write!(f, "query"),
            SourceKind::Header => write!(f, "header"),
            SourceKind::Body => write!(f, "body"),
            SourceKind::Embedded => write!(f, "embedded"),
        }
    }
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Plain field (`T`).
    One,
    /// Pointer-like optional field (`Option<T>`); absent input leaves it unset.
    Optional,
    /// Repeated field (`Vec<T>`); only query and body sources may fill it.
    Many,
}

/// Compiled binding metadata for one record field.
///
/// Built once per record shape and never mutated afterwards, so a shape can be
/// shared across concurrent requests without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name.
    pub name: &'static str,
    /// Type name of the record that declares the field. Differs from the
    /// decoded record for fields flattened in from an embedded record.
    pub owner: &'static str,
    pub source: SourceKind,
    /// Source key (path segment, query name, header name or body key).
    pub key: Option<&'static str>,
    pub target: TargetType,
    pub cardinality: Cardinality,
    /// Literal applied when the field is still zero after decoding.
    pub default: Option<&'static str>,
    /// Validation rule text. Opaque to the decoder, handed to validators.
    pub validate: Option<&'static str>,
}

impl FieldDescriptor {
    /// Pointer-like optional field.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.cardinality == Cardinality::Optional
    }

    /// Whether the decoder writes this field from a key/value source.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        matches!(
            self.source,
            SourceKind::Path | SourceKind::Query | SourceKind::Header
        )
    }
}
