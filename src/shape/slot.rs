//! Typed storage targets for decoded values.
//!
//! [`Scalar`] covers every type the coercer can produce. [`Slot`] is the
//! object-safe write interface the decoder and the default pass use on a field,
//! implemented for each scalar `T`, `Option<T>` and `Vec<T>`. [`FieldType`]
//! carries the same information statically so a shape can be described without
//! an instance of the record.

use super::descriptor::Cardinality;
use crate::coerce::{CoercionError, TargetType, Value};
use crate::Record;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A type a source string can be coerced into.
pub trait Scalar: Sized + PartialEq + Send + 'static {
    const TARGET: TargetType;

    fn zero() -> Self;

    /// Unwrap a coerced value produced for [`Scalar::TARGET`].
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError::Mismatch`] if the value was coerced for another
    /// type, or an out-of-range error if it does not fit.
    fn from_value(value: Value) -> Result<Self, CoercionError>;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

fn mismatch(expected: TargetType, value: &Value) -> CoercionError {
    CoercionError::Mismatch {
        expected,
        found: value.kind(),
    }
}

macro_rules! signed_scalar {
    ($($ty:ty => $target:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            const TARGET: TargetType = TargetType::$target;

            fn zero() -> Self {
                0
            }

            fn from_value(value: Value) -> Result<Self, CoercionError> {
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|e| CoercionError::InvalidNumber {
                        input: v.to_string(),
                        target: <Self as Scalar>::TARGET,
                        reason: e.to_string(),
                    }),
                    other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
                }
            }
        }
    )*};
}

macro_rules! unsigned_scalar {
    ($($ty:ty => $target:ident),* $(,)?) => {$(
        impl Scalar for $ty {
            const TARGET: TargetType = TargetType::$target;

            fn zero() -> Self {
                0
            }

            fn from_value(value: Value) -> Result<Self, CoercionError> {
                match value {
                    Value::Uint(v) => <$ty>::try_from(v).map_err(|e| CoercionError::InvalidNumber {
                        input: v.to_string(),
                        target: <Self as Scalar>::TARGET,
                        reason: e.to_string(),
                    }),
                    other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
                }
            }
        }
    )*};
}

signed_scalar!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, isize => Isize);
unsigned_scalar!(u8 => U8, u16 => U16, u32 => U32, u64 => U64, usize => Usize);

impl Scalar for String {
    const TARGET: TargetType = TargetType::String;

    fn zero() -> Self {
        String::new()
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Scalar for bool {
    const TARGET: TargetType = TargetType::Bool;

    fn zero() -> Self {
        false
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }
}

impl Scalar for f64 {
    const TARGET: TargetType = TargetType::F64;

    fn zero() -> Self {
        0.0
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }
}

impl Scalar for f32 {
    const TARGET: TargetType = TargetType::F32;

    fn zero() -> Self {
        0.0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            // The coercer parsed this as f32 before widening, so narrowing is exact.
            Value::Float(f) => Ok(f as f32),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }
}

impl Scalar for Duration {
    const TARGET: TargetType = TargetType::Duration;

    fn zero() -> Self {
        Duration::ZERO
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            Value::Duration(d) => Ok(d),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }
}

impl Scalar for DateTime<Utc> {
    const TARGET: TargetType = TargetType::Timestamp;

    fn zero() -> Self {
        DateTime::<Utc>::default()
    }

    fn from_value(value: Value) -> Result<Self, CoercionError> {
        match value {
            Value::Timestamp(t) => Ok(t),
            other => Err(mismatch(<Self as Scalar>::TARGET, &other)),
        }
    }
}

/// Write access to one decoded field.
pub trait Slot {
    /// Whether the field still holds its zero value (empty string, 0, false,
    /// unset option, empty list).
    fn is_zero(&self) -> bool;

    /// Store a coerced value. Plain fields are overwritten, optional fields are
    /// set, repeated fields are appended to.
    ///
    /// # Errors
    ///
    /// Returns a [`CoercionError`] if the value does not fit the field type.
    fn store(&mut self, value: Value) -> Result<(), CoercionError>;

    /// Reset to the zero value.
    fn clear(&mut self);
}

/// Static description of a field type, used while building a shape.
pub trait FieldType {
    const TARGET: TargetType;
    const CARDINALITY: Cardinality;
}

macro_rules! scalar_slots {
    ($($ty:ty),* $(,)?) => {$(
        impl Slot for $ty {
            fn is_zero(&self) -> bool {
                Scalar::is_zero(self)
            }

            fn store(&mut self, value: Value) -> Result<(), CoercionError> {
                *self = <$ty as Scalar>::from_value(value)?;
                Ok(())
            }

            fn clear(&mut self) {
                *self = <$ty as Scalar>::zero();
            }
        }

        impl FieldType for $ty {
            const TARGET: TargetType = <$ty as Scalar>::TARGET;
            const CARDINALITY: Cardinality = Cardinality::One;
        }

        impl Slot for Option<$ty> {
            fn is_zero(&self) -> bool {
                self.is_none()
            }

            fn store(&mut self, value: Value) -> Result<(), CoercionError> {
                *self = Some(<$ty as Scalar>::from_value(value)?);
                Ok(())
            }

            fn clear(&mut self) {
                *self = None;
            }
        }

        impl FieldType for Option<$ty> {
            const TARGET: TargetType = <$ty as Scalar>::TARGET;
            const CARDINALITY: Cardinality = Cardinality::Optional;
        }

        impl Slot for Vec<$ty> {
            fn is_zero(&self) -> bool {
                self.is_empty()
            }

            fn store(&mut self, value: Value) -> Result<(), CoercionError> {
                self.push(<$ty as Scalar>::from_value(value)?);
                Ok(())
            }

            fn clear(&mut self) {
                Vec::clear(self);
            }
        }

        impl FieldType for Vec<$ty> {
            const TARGET: TargetType = <$ty as Scalar>::TARGET;
            const CARDINALITY: Cardinality = Cardinality::Many;
        }
    )*};
}

scalar_slots!(
    String,
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    Duration,
    DateTime<Utc>,
);

/// A field holding an embedded record `E`: `E`, `Box<E>`, `Option<E>` or
/// `Option<Box<E>>`.
///
/// Optional holders are allocated on first write.
pub trait Embedded<E: Record>: Send + 'static {
    const OPTIONAL: bool;

    /// Borrow the embedded record, allocating it if the holder is unset.
    fn materialize(&mut self) -> &mut E;

    /// Borrow the embedded record without allocating.
    fn existing(&mut self) -> Option<&mut E>;
}

impl<E: Record> Embedded<E> for E {
    const OPTIONAL: bool = false;

    fn materialize(&mut self) -> &mut E {
        self
    }

    fn existing(&mut self) -> Option<&mut E> {
        Some(self)
    }
}

impl<E: Record> Embedded<E> for Box<E> {
    const OPTIONAL: bool = false;

    fn materialize(&mut self) -> &mut E {
        &mut **self
    }

    fn existing(&mut self) -> Option<&mut E> {
        Some(&mut **self)
    }
}

impl<E: Record> Embedded<E> for Option<E> {
    const OPTIONAL: bool = true;

    fn materialize(&mut self) -> &mut E {
        self.get_or_insert_with(E::default)
    }

    fn existing(&mut self) -> Option<&mut E> {
        self.as_mut()
    }
}

impl<E: Record> Embedded<E> for Option<Box<E>> {
    const OPTIONAL: bool = true;

    fn materialize(&mut self) -> &mut E {
        &mut **self.get_or_insert_with(Box::default)
    }

    fn existing(&mut self) -> Option<&mut E> {
        self.as_deref_mut()
    }
}
