use anyhow::anyhow;
use formbind::adapter::{typed, OutputKind, ParamKind, Phase, RecordRef};
use formbind::{
    Binder, Failure, JsonEmitter, Record, RequestContext, ShapeError, ShapeKind, Signature,
    SourceBundle, ValidationError,
};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;
use common::emitter::{Emitted, RecordingEmitter};
use common::fixtures::{ctx, json_bundle};

#[derive(Debug, Default, Deserialize, Record)]
#[serde(default)]
pub struct CreateUser {
    #[bind(path = "org")]
    pub org: u32,
    #[bind(body = "name", default = "John")]
    pub name: String,
    #[bind(body = "age", validate = "min=18")]
    pub age: u8,
}

#[derive(Debug, Serialize)]
struct Created {
    org: u32,
    name: String,
}

fn create_user(_ctx: &RequestContext, input: CreateUser) -> anyhow::Result<Created> {
    Ok(Created {
        org: input.org,
        name: input.name,
    })
}

fn delete_user(_ctx: &RequestContext, input: CreateUser) -> anyhow::Result<()> {
    if input.org == 404 {
        return Err(anyhow!("record not found"));
    }
    Ok(())
}

fn health(_ctx: &RequestContext) -> anyhow::Result<()> {
    Ok(())
}

fn version(_ctx: &RequestContext) -> Result<&'static str, std::io::Error> {
    Ok("1.2.3")
}

#[test]
fn test_four_shapes_are_recognized() {
    let binder = Binder::new();
    assert_eq!(binder.adapt(health).unwrap().kind(), ShapeKind::NoInput);
    assert_eq!(
        binder.adapt(version).unwrap().kind(),
        ShapeKind::NoInputWithValue
    );
    assert_eq!(
        binder.adapt(delete_user).unwrap().kind(),
        ShapeKind::RecordInput
    );
    assert_eq!(
        binder.adapt(create_user).unwrap().kind(),
        ShapeKind::RecordInputWithValue
    );
}

#[test]
fn test_record_handler_end_to_end() {
    let bound = Binder::new().adapt(create_user).unwrap();
    assert!(bound.record_type().ends_with("CreateUser"));

    let bundle = json_bundle(r#"{"age":30}"#).with_path_param("org", "9");
    let response = bound.handle(&ctx("create_user"), &bundle);
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({ "status": "success", "data": { "org": 9, "name": "John" } })
    );
}

#[test]
fn test_outcome_only_handlers_return_no_value() {
    let bound = Binder::new().adapt(delete_user).unwrap();
    let value = bound
        .call(&ctx("delete_user"), &json_bundle("{}").with_path_param("org", "1"))
        .unwrap();
    assert!(value.is_none());

    let bound = Binder::new().adapt(health).unwrap();
    let response = bound.handle(&ctx("health"), &SourceBundle::new());
    assert_eq!(response.body, json!({ "status": "success" }));
}

#[test]
fn test_context_only_handler_ignores_the_body() {
    let bound = Binder::new().adapt(version).unwrap();
    let value = bound
        .call(&ctx("version"), &json_bundle("{broken"))
        .unwrap();
    assert_eq!(value, Some(json!("1.2.3")));
}

#[test]
fn test_malformed_body_never_reaches_handler() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let handler = move |_ctx: &RequestContext, _input: CreateUser| -> anyhow::Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    let binder = Binder::new().with_emitter(RecordingEmitter::default());
    let bound = binder.adapt(handler).unwrap();
    let emitted = bound.handle(&ctx("create_user"), &json_bundle(r#"{"name":"Ann",}"#));

    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert!(matches!(emitted, Emitted::Failure(ref m) if m.starts_with("failed to decode request body")));
    assert_eq!(binder.emitter().calls().len(), 1);
}

#[test]
fn test_emitter_called_once_per_request() {
    let binder = Binder::new().with_emitter(RecordingEmitter::default());
    let bound = binder.adapt(create_user).unwrap();

    bound.handle(&ctx("create_user"), &json_bundle(r#"{"name":"Ann"}"#));
    bound.handle(&ctx("create_user"), &json_bundle("42"));

    let calls = binder.emitter().calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0],
        Emitted::Success(Some(json!({ "org": 0, "name": "Ann" })))
    );
    assert!(matches!(calls[1], Emitted::Failure(_)));
}

#[test]
fn test_decode_failure_maps_to_bad_request() {
    let bound = Binder::new().adapt(create_user).unwrap();
    let bundle = json_bundle("{}").with_path_param("org", "nine");
    let response = bound.handle(&ctx("create_user"), &bundle);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "error");
}

#[test]
fn test_handler_error_passes_through() {
    let bound = Binder::new().adapt(delete_user).unwrap();
    let bundle = json_bundle("{}").with_path_param("org", "404");

    let failure = bound.call(&ctx("delete_user"), &bundle).unwrap_err();
    assert!(matches!(failure, Failure::Handler(_)));
    assert_eq!(failure.phase(), Phase::Invoked);

    let response = bound.handle(&ctx("delete_user"), &bundle);
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["message"], "record not found");
}

#[test]
fn test_validator_rejection_skips_handler() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invoked);
    let handler = move |_ctx: &RequestContext, input: CreateUser| -> anyhow::Result<u8> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(input.age)
    };

    let binder = Binder::new().with_validator(typed(|user: &CreateUser| {
        if user.age >= 18 {
            Ok(())
        } else {
            Err(ValidationError::for_field("age", "must be at least 18"))
        }
    }));
    let bound = binder.adapt(handler).unwrap();

    let failure = bound
        .call(&ctx("create_user"), &json_bundle(r#"{"age":12}"#))
        .unwrap_err();
    assert!(matches!(failure, Failure::Validation(_)));
    assert_eq!(failure.phase(), Phase::Validated);
    assert_eq!(failure.to_string(), "age: must be at least 18");
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    let value = bound
        .call(&ctx("create_user"), &json_bundle(r#"{"age":21}"#))
        .unwrap();
    assert_eq!(value, Some(json!(21)));
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
}

#[test]
fn test_validator_sees_defaults_and_rules() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let check = move |record: RecordRef<'_>| -> Result<(), ValidationError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let user = record.downcast_ref::<CreateUser>().unwrap();
        assert_eq!(user.name, "John");
        let rule = record
            .fields()
            .iter()
            .find(|d| d.name == "age")
            .and_then(|d| d.validate);
        assert_eq!(rule, Some("min=18"));
        Ok(())
    };
    let binder = Binder::new().with_validator(check);

    binder
        .adapt(create_user)
        .unwrap()
        .call(&ctx("create_user"), &json_bundle("{}"))
        .unwrap();
    binder
        .adapt(health)
        .unwrap()
        .call(&ctx("health"), &SourceBundle::new())
        .unwrap();
    // Context-only handlers have nothing to validate.
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_handler_becomes_failure() {
    let _tracing = common::tracing_setup::init();
    let handler = |_ctx: &RequestContext| -> anyhow::Result<()> { panic!("boom") };
    let bound = Binder::new().adapt(handler).unwrap();

    let failure = bound.call(&ctx("explode"), &SourceBundle::new()).unwrap_err();
    assert_eq!(failure.to_string(), "handler panicked: boom");

    let response = bound.handle(&ctx("explode"), &SourceBundle::new());
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_three_parameter_candidate_rejected() {
    let signature = Signature::function("fn(&RequestContext, CreateUser, u32) -> Result<(), Error>")
        .input(ParamKind::Context)
        .input(ParamKind::Record("CreateUser"))
        .input(ParamKind::Other("u32"))
        .output(OutputKind::Outcome);
    assert_eq!(
        signature.classify(),
        Err(ShapeError::TooManyParameters { count: 3 })
    );
}

#[test]
fn test_signature_rules() {
    let not_fn = Signature::not_callable("i32");
    assert_eq!(
        not_fn.classify(),
        Err(ShapeError::NotCallable { candidate: "i32" })
    );

    let no_params = Signature::function("fn()").output(OutputKind::Outcome);
    assert_eq!(no_params.classify(), Err(ShapeError::NoParameters));

    let wrong_first = Signature::function("fn(String)")
        .input(ParamKind::Other("String"))
        .output(OutputKind::Outcome);
    assert_eq!(
        wrong_first.classify(),
        Err(ShapeError::FirstParameterNotContext { found: "String" })
    );

    let no_outputs = Signature::function("fn(&RequestContext)").input(ParamKind::Context);
    assert_eq!(no_outputs.classify(), Err(ShapeError::NoOutputs));

    let value_only = Signature::function("fn(&RequestContext) -> User")
        .input(ParamKind::Context)
        .output(OutputKind::Value("User"));
    assert_eq!(
        value_only.classify(),
        Err(ShapeError::SingleOutputNotOutcome { found: "User" })
    );
}

#[derive(Debug, Default, Deserialize, Record)]
#[serde(default)]
pub struct Unbindable {
    #[bind(path = "ids")]
    pub ids: Vec<u32>,
}

fn takes_unbindable(_ctx: &RequestContext, _input: Unbindable) -> anyhow::Result<()> {
    Ok(())
}

#[test]
fn test_record_shape_errors_surface_at_adapt() {
    let err = Binder::new().adapt(takes_unbindable).unwrap_err();
    assert!(matches!(
        err,
        ShapeError::RepeatedSource { field: "ids", .. }
    ));
}

#[test]
fn test_bound_handler_is_shareable_across_threads() {
    let bound = Binder::new().adapt(create_user).unwrap();
    let workers: Vec<_> = (0..4)
        .map(|org| {
            let bound = bound.clone();
            std::thread::spawn(move || {
                let bundle = json_bundle("{}").with_path_param("org", org.to_string());
                bound.handle(&ctx("create_user"), &bundle)
            })
        })
        .collect();
    for (org, worker) in workers.into_iter().enumerate() {
        let response = worker.join().unwrap();
        assert_eq!(response.body["data"]["org"], org);
    }
}

#[test]
fn test_terminal_phases() {
    assert!(Phase::Succeeded.is_terminal());
    assert!(Phase::Failed.is_terminal());
    assert!(!Phase::Invoked.is_terminal());
    assert!(!Phase::Unstarted.is_terminal());
}

#[test]
fn test_status_mapping_for_validation_failures() {
    let failure = Failure::Validation(ValidationError::new("unauthorized"));
    assert_eq!(JsonEmitter::status_for(&failure), StatusCode::UNAUTHORIZED);
}
