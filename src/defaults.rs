//! Post-decode default application.

use crate::coerce::coerce;
use crate::error::{DecodeCause, DecodingError, Stage};
use crate::shape::RecordShape;
use crate::Record;
use tracing::{debug, error};

/// Fill every default-tagged field that still holds its zero value.
///
/// Flattened fields of embedded records are covered; an unset optional holder
/// is allocated before its field is inspected. A zero value the request
/// supplied explicitly is indistinguishable from an absent one and is
/// replaced too.
///
/// # Errors
///
/// Returns a [`DecodingError`] with [`Stage::Default`] if a default literal
/// does not coerce into its field's type.
pub fn apply_defaults<R: Record>(
    shape: &RecordShape<R>,
    record: &mut R,
) -> Result<(), DecodingError> {
    let mut applied = 0_usize;
    for (index, descriptor) in shape.descriptors().iter().enumerate() {
        let Some(literal) = descriptor.default else {
            continue;
        };
        let Some(slot) = shape.slot(index, record) else {
            continue;
        };
        if !slot.is_zero() {
            continue;
        }

        let fail = |cause| {
            error!(
                record = shape.type_name(),
                field = descriptor.name,
                default = literal,
                "invalid default literal"
            );
            DecodingError::field(Stage::Default, descriptor.name, Some(literal), cause)
        };
        let value = coerce(literal, descriptor.target).map_err(|e| fail(DecodeCause::Coercion(e)))?;
        slot.store(value).map_err(|e| fail(DecodeCause::Coercion(e)))?;
        applied += 1;
    }
    debug!(record = shape.type_name(), applied, "defaults applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeBuilder;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Settings {
        retries: u8,
        label: Option<String>,
        bad: i32,
    }

    impl Record for Settings {
        fn describe(shape: &mut ShapeBuilder<Self>) {
            shape.field::<u8>("retries", |r| &mut r.retries).default("3");
            shape
                .field::<Option<String>>("label", |r| &mut r.label)
                .default("none");
        }
    }

    #[derive(Debug, Default, Deserialize)]
    struct WithBadDefault {
        count: i32,
    }

    impl Record for WithBadDefault {
        fn describe(shape: &mut ShapeBuilder<Self>) {
            shape.field::<i32>("count", |r| &mut r.count).default("many");
        }
    }

    #[test]
    fn fills_zero_fields_only() {
        let shape = RecordShape::<Settings>::build().unwrap();
        let mut record = Settings {
            retries: 5,
            ..Settings::default()
        };
        apply_defaults(&shape, &mut record).unwrap();
        assert_eq!(record.retries, 5);
        assert_eq!(record.label.as_deref(), Some("none"));
        assert_eq!(record.bad, 0);
    }

    #[test]
    fn bad_literal_is_a_default_stage_error() {
        let shape = RecordShape::<WithBadDefault>::build().unwrap();
        let err = apply_defaults(&shape, &mut WithBadDefault::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Default);
        assert_eq!(err.field, Some("count"));
        assert_eq!(err.key, Some("many"));
    }
}
