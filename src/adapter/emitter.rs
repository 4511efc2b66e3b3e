use crate::context::RequestContext;
use crate::error::Failure;
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};

/// Turns the terminal outcome of an invocation into a response.
///
/// Exactly one of the two methods is called per request.
pub trait ResponseEmitter: Send + Sync + 'static {
    type Response;

    /// `value` is `None` for outcome-only handlers.
    fn on_success(&self, ctx: &RequestContext, value: Option<Value>) -> Self::Response;

    fn on_failure(&self, ctx: &RequestContext, failure: &Failure) -> Self::Response;
}

/// Status code and JSON body produced by [`JsonEmitter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonResponse {
    #[serde(serialize_with = "serialize_status")]
    pub status: StatusCode,
    pub body: Value,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

/// Default emitter: `{"status":"success","data":...}` or
/// `{"status":"error","message":...}`.
///
/// Decoding failures map to 400. Other failures map to 404, 401 or 403 when
/// their message is exactly `record not found`, `unauthorized` or `forbidden`,
/// and to 500 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEmitter;

impl JsonEmitter {
    pub fn status_for(failure: &Failure) -> StatusCode {
        if let Failure::Decode(_) = failure {
            return StatusCode::BAD_REQUEST;
        }
        match failure.to_string().as_str() {
            "record not found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseEmitter for JsonEmitter {
    type Response = JsonResponse;

    fn on_success(&self, _ctx: &RequestContext, value: Option<Value>) -> JsonResponse {
        let body = match value {
            Some(data) => json!({ "status": "success", "data": data }),
            None => json!({ "status": "success" }),
        };
        JsonResponse {
            status: StatusCode::OK,
            body,
        }
    }

    fn on_failure(&self, _ctx: &RequestContext, failure: &Failure) -> JsonResponse {
        JsonResponse {
            status: Self::status_for(failure),
            body: json!({ "status": "error", "message": failure.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ValidationError;
    use http::Method;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/users/1", "get_user")
    }

    #[test]
    fn success_omits_data_without_value() {
        let response = JsonEmitter.on_success(&ctx(), None);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "status": "success" }));

        let response = JsonEmitter.on_success(&ctx(), Some(json!({ "id": 1 })));
        assert_eq!(response.body["data"]["id"], 1);
    }

    #[test]
    fn well_known_messages_pick_the_status() {
        let cases = [
            ("record not found", StatusCode::NOT_FOUND),
            ("unauthorized", StatusCode::UNAUTHORIZED),
            ("forbidden", StatusCode::FORBIDDEN),
            ("disk on fire", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (message, status) in cases {
            let failure = Failure::Handler(anyhow::anyhow!(message));
            let response = JsonEmitter.on_failure(&ctx(), &failure);
            assert_eq!(response.status, status);
            assert_eq!(response.body["message"], message);
        }
    }

    #[test]
    fn validation_failures_are_not_request_errors() {
        let failure = Failure::Validation(ValidationError::new("forbidden"));
        assert_eq!(JsonEmitter::status_for(&failure), StatusCode::FORBIDDEN);
    }
}
