//! Multi-source record decoding.
//!
//! Stages run in a fixed order: path, query, header, body. Query and header
//! stages are skipped when the shape binds nothing from them. Path, query and
//! header values are coerced as their stage runs, so errors surface in stage
//! order, but they are written to the record only after the body has been
//! parsed. The body never reaches a path, query or header field: their keys
//! are dropped from the document before it is deserialized, and the fields are
//! zeroed again before the keyed values are written.

use crate::bundle::{BodyFormat, SourceBundle};
use crate::coerce::{coerce, Value};
use crate::config::BinderConfig;
use crate::error::{DecodeCause, DecodingError, Stage};
use crate::shape::{Cardinality, FieldDescriptor, RecordShape, SourceKind};
use crate::Record;
use smallvec::SmallVec;
use tracing::debug;

type Staged = SmallVec<[(usize, SmallVec<[Value; 1]>); 8]>;

/// Decode `bundle` into a new `R`.
///
/// Empty or absent source values leave their field at its zero value; optional
/// fields stay `None`. Defaults are not applied here, see
/// [`apply_defaults`](crate::apply_defaults).
///
/// # Errors
///
/// Returns the first [`DecodingError`] in stage order. Nothing is partially
/// applied: on error the record is dropped.
pub fn decode<R: Record>(
    shape: &RecordShape<R>,
    bundle: &SourceBundle,
    config: &BinderConfig,
) -> Result<R, DecodingError> {
    let mut staged = Staged::new();

    path_stage(shape, bundle, &mut staged)?;
    if shape.has_query() {
        query_stage(shape, bundle, &mut staged)?;
    }
    if shape.has_header() {
        header_stage(shape, bundle, &mut staged)?;
    }

    let mut record: R = decode_body(shape, bundle, config)?;
    record.clear_hidden();
    shape.reset_keyed(&mut record);
    debug!(record = shape.type_name(), "body decoded");

    write_staged(shape, &mut record, staged)?;
    Ok(record)
}

fn keyed<'a, R>(
    shape: &'a RecordShape<R>,
    source: SourceKind,
) -> impl Iterator<Item = (usize, &'a FieldDescriptor, &'static str)> + 'a {
    shape
        .descriptors()
        .iter()
        .enumerate()
        .filter(move |(_, d)| d.source == source)
        .filter_map(|(i, d)| d.key.map(|key| (i, d, key)))
}

fn coerce_field(
    stage: Stage,
    descriptor: &FieldDescriptor,
    raw: &str,
) -> Result<Value, DecodingError> {
    coerce(raw, descriptor.target).map_err(|e| {
        DecodingError::field(
            stage,
            descriptor.name,
            descriptor.key,
            DecodeCause::Coercion(e),
        )
    })
}

fn path_stage<R>(
    shape: &RecordShape<R>,
    bundle: &SourceBundle,
    staged: &mut Staged,
) -> Result<(), DecodingError> {
    let before = staged.len();
    for (index, descriptor, key) in keyed(shape, SourceKind::Path) {
        match bundle.path_param(key) {
            Some(raw) if !raw.is_empty() => {
                let value = coerce_field(Stage::Path, descriptor, raw)?;
                staged.push((index, smallvec::smallvec![value]));
            }
            _ => {}
        }
    }
    debug!(
        record = shape.type_name(),
        bound = staged.len() - before,
        "path stage complete"
    );
    Ok(())
}

fn query_stage<R>(
    shape: &RecordShape<R>,
    bundle: &SourceBundle,
    staged: &mut Staged,
) -> Result<(), DecodingError> {
    let before = staged.len();
    for (index, descriptor, key) in keyed(shape, SourceKind::Query) {
        let mut values = SmallVec::new();
        if descriptor.cardinality == Cardinality::Many {
            for raw in bundle.query_values(key).filter(|v| !v.is_empty()) {
                values.push(coerce_field(Stage::Query, descriptor, raw)?);
            }
        } else if let Some(raw) = bundle.query_values(key).next() {
            if !raw.is_empty() {
                values.push(coerce_field(Stage::Query, descriptor, raw)?);
            }
        }
        if !values.is_empty() {
            staged.push((index, values));
        }
    }
    debug!(
        record = shape.type_name(),
        bound = staged.len() - before,
        "query stage complete"
    );
    Ok(())
}

fn header_stage<R>(
    shape: &RecordShape<R>,
    bundle: &SourceBundle,
    staged: &mut Staged,
) -> Result<(), DecodingError> {
    let before = staged.len();
    for (index, descriptor, key) in keyed(shape, SourceKind::Header) {
        let Some(header) = bundle.header(key) else {
            continue;
        };
        let raw = header.to_str().map_err(|e| {
            DecodingError::field(
                Stage::Header,
                descriptor.name,
                descriptor.key,
                DecodeCause::InvalidHeader(e),
            )
        })?;
        if !raw.is_empty() {
            let value = coerce_field(Stage::Header, descriptor, raw)?;
            staged.push((index, smallvec::smallvec![value]));
        }
    }
    debug!(
        record = shape.type_name(),
        bound = staged.len() - before,
        "header stage complete"
    );
    Ok(())
}

fn decode_body<R: Record>(
    shape: &RecordShape<R>,
    bundle: &SourceBundle,
    config: &BinderConfig,
) -> Result<R, DecodingError> {
    let body = bundle.body();
    if let Some(limit) = config.max_body_bytes {
        if body.len() > limit {
            return Err(DecodingError::body(DecodeCause::BodyTooLarge {
                limit,
                actual: body.len(),
            }));
        }
    }

    let blank = config.empty_body_as_empty_document && body.iter().all(u8::is_ascii_whitespace);
    let keyed = shape.keyed_paths().next().is_some();
    match bundle.body_format().unwrap_or(config.default_body_format) {
        BodyFormat::Json => {
            let document: &[u8] = if blank { b"{}" } else { body };
            let json = |e| DecodingError::body(DecodeCause::Json(e));
            if !keyed {
                return serde_json::from_slice(document).map_err(json);
            }
            let mut value: serde_json::Value = serde_json::from_slice(document).map_err(json)?;
            if let serde_json::Value::Object(map) = &mut value {
                for path in shape.keyed_paths() {
                    strip_json(map, path);
                }
            }
            serde_json::from_value(value).map_err(json)
        }
        BodyFormat::Form => {
            let document: &[u8] = if blank { b"" } else { body };
            let form = |e| DecodingError::body(DecodeCause::Form(e));
            if !keyed {
                return serde_urlencoded::from_bytes(document).map_err(form);
            }
            let leaves: SmallVec<[&str; 8]> =
                shape.keyed_paths().filter_map(|p| p.last().copied()).collect();
            let kept = url::form_urlencoded::parse(document)
                .filter(|(name, _)| !leaves.contains(&&**name));
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(kept)
                .finish();
            serde_urlencoded::from_str(&encoded).map_err(form)
        }
    }
}

/// Remove the entry at `path`, also looking through each embedding level as if
/// it were flattened into its parent.
fn strip_json(map: &mut serde_json::Map<String, serde_json::Value>, path: &[&str]) {
    match path {
        [] => {}
        [leaf] => {
            map.remove(*leaf);
        }
        [outer, rest @ ..] => {
            if let Some(serde_json::Value::Object(inner)) = map.get_mut(*outer) {
                strip_json(inner, rest);
            }
            strip_json(map, rest);
        }
    }
}

fn write_staged<R>(
    shape: &RecordShape<R>,
    record: &mut R,
    staged: Staged,
) -> Result<(), DecodingError> {
    let descriptors = shape.descriptors();
    for (index, values) in staged {
        let Some(slot) = shape.slot(index, record) else {
            continue;
        };
        let descriptor = &descriptors[index];
        if descriptor.cardinality == Cardinality::Many {
            slot.clear();
        }
        for value in values {
            slot.store(value).map_err(|e| {
                DecodingError::field(
                    descriptor.source.into(),
                    descriptor.name,
                    descriptor.key,
                    DecodeCause::Coercion(e),
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeBuilder;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Lookup {
        id: u32,
        name: String,
        ids: Vec<u32>,
    }

    impl Record for Lookup {
        fn describe(shape: &mut ShapeBuilder<Self>) {
            shape.field::<u32>("id", |r| &mut r.id).path("id");
            shape.field::<String>("name", |r| &mut r.name).body("name");
            shape.field::<Vec<u32>>("ids", |r| &mut r.ids).query("id");
        }
    }

    fn shape() -> RecordShape<Lookup> {
        RecordShape::build().unwrap()
    }

    #[test]
    fn keyed_values_replace_body_keys() {
        let bundle = SourceBundle::new()
            .with_path_param("id", "9")
            .with_query_string("id=1&id=&id=2")
            .with_body(r#"{"id": 4, "ids": [7], "name": "Ann"}"#);
        let record = decode(&shape(), &bundle, &BinderConfig::default()).unwrap();
        assert_eq!(record.id, 9);
        assert_eq!(record.ids, vec![1, 2]);
        assert_eq!(record.name, "Ann");
    }

    #[test]
    fn body_cannot_reach_keyed_fields() {
        let bundle = SourceBundle::new().with_body(r#"{"id": 4, "ids": [7], "name": "Ann"}"#);
        let record = decode(&shape(), &bundle, &BinderConfig::default()).unwrap();
        assert_eq!(record.id, 0);
        assert!(record.ids.is_empty());
        assert_eq!(record.name, "Ann");

        let bundle = SourceBundle::new()
            .with_path_param("id", "5")
            .with_body(r#"{"id": "abc", "ids": "x", "name": "Ann"}"#);
        let record = decode(&shape(), &bundle, &BinderConfig::default()).unwrap();
        assert_eq!(record.id, 5);
    }

    #[test]
    fn strip_json_handles_nested_and_flattened_keys() {
        let mut value = serde_json::json!({
            "page": 1,
            "paging": { "page": 2, "size": 3 },
            "note": "keep"
        });
        let map = value.as_object_mut().unwrap();
        strip_json(map, &["paging", "page"]);
        assert_eq!(
            value,
            serde_json::json!({ "paging": { "size": 3 }, "note": "keep" })
        );
    }

    #[test]
    fn path_error_wins_over_body_error() {
        let bundle = SourceBundle::new()
            .with_path_param("id", "nine")
            .with_body("{broken");
        let err = decode(&shape(), &bundle, &BinderConfig::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Path);
        assert_eq!(err.field, Some("id"));
    }

    #[test]
    fn blank_body_is_an_empty_document() {
        let bundle = SourceBundle::new().with_body("  \n");
        let record = decode(&shape(), &bundle, &BinderConfig::default()).unwrap();
        assert_eq!(record.name, "");

        let strict = BinderConfig {
            empty_body_as_empty_document: false,
            ..BinderConfig::default()
        };
        let err = decode(&shape(), &bundle, &strict).unwrap_err();
        assert_eq!(err.stage, Stage::Body);
    }

    #[test]
    fn oversized_body_is_rejected() {
        let config = BinderConfig {
            max_body_bytes: Some(4),
            ..BinderConfig::default()
        };
        let bundle = SourceBundle::new().with_body(r#"{"name":"Ann"}"#);
        let err = decode(&shape(), &bundle, &config).unwrap_err();
        assert!(matches!(
            err.cause,
            DecodeCause::BodyTooLarge { limit: 4, .. }
        ));
    }
}
