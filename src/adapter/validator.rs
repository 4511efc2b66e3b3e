use crate::shape::FieldDescriptor;
use std::any::Any;
use std::fmt;

/// Rejection returned by a [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Offending field, when the rule is tied to one
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError {
            field: None,
            message: message.into(),
        }
    }

    pub fn for_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A decoded record as seen by a [`Validator`].
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    record: &'a dyn Any,
    type_name: &'static str,
    fields: &'a [FieldDescriptor],
}

impl<'a> RecordRef<'a> {
    pub(crate) fn new(
        record: &'a dyn Any,
        type_name: &'static str,
        fields: &'a [FieldDescriptor],
    ) -> Self {
        RecordRef {
            record,
            type_name,
            fields,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Field descriptors, including opaque `validate` rules.
    pub fn fields(&self) -> &'a [FieldDescriptor] {
        self.fields
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        self.record.downcast_ref()
    }
}

impl fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRef")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Structured validation consulted after defaults and before the handler.
pub trait Validator: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] to reject the record; the handler is then
    /// not invoked.
    fn validate(&self, record: RecordRef<'_>) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(RecordRef<'_>) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, record: RecordRef<'_>) -> Result<(), ValidationError> {
        self(record)
    }
}

/// Validator for a single record type. Records of other types pass.
pub fn typed<R, F>(check: F) -> impl Validator
where
    R: Any,
    F: Fn(&R) -> Result<(), ValidationError> + Send + Sync,
{
    move |record: RecordRef<'_>| match record.downcast_ref::<R>() {
        Some(record) => check(record),
        None => Ok(()),
    }
}
