use formbind::{Binder, BinderConfig, BodyFormat, Record, RequestContext};
use http::{Method, StatusCode};
use serde::Deserialize;

mod common;
use common::fixtures::json_bundle;
use common::temp_files::create_temp_yaml;

#[test]
fn test_load_from_yaml_file() {
    let file = create_temp_yaml(
        "max_body_bytes: 1024\nempty_body_as_empty_document: false\ndefault_body_format: form\n",
    );
    let config = BinderConfig::load(file.path()).unwrap();
    assert_eq!(config.max_body_bytes, Some(1024));
    assert!(!config.empty_body_as_empty_document);
    assert_eq!(config.default_body_format, BodyFormat::Form);
}

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = BinderConfig::from_yaml_str("max_body_bytes: 64\n").unwrap();
    assert_eq!(config.max_body_bytes, Some(64));
    assert!(config.empty_body_as_empty_document);
    assert_eq!(config.default_body_format, BodyFormat::Json);
}

#[test]
fn test_missing_file_reports_path() {
    let err = BinderConfig::load(std::path::Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.yaml"));
}

#[test]
fn test_invalid_yaml_rejected() {
    let file = create_temp_yaml("default_body_format: xml\n");
    assert!(BinderConfig::load(file.path()).is_err());
}

#[derive(Debug, Default, Deserialize, Record)]
#[serde(default)]
pub struct Upload {
    #[bind(body = "data")]
    pub data: String,
}

fn upload(_ctx: &RequestContext, input: Upload) -> anyhow::Result<usize> {
    Ok(input.data.len())
}

#[test]
fn test_binder_applies_body_limit() {
    let config = BinderConfig {
        max_body_bytes: Some(16),
        ..BinderConfig::default()
    };
    let bound = Binder::new().with_config(config).adapt(upload).unwrap();
    let ctx = RequestContext::new(Method::POST, "/upload", "upload");

    let small = bound.handle(&ctx, &json_bundle(r#"{"data":"ok"}"#));
    assert_eq!(small.status, StatusCode::OK);
    assert_eq!(small.body["data"], 2);

    let large = bound.handle(&ctx, &json_bundle(r#"{"data":"far too much data"}"#));
    assert_eq!(large.status, StatusCode::BAD_REQUEST);
}
