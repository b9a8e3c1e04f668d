use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::adapters::platform::PlatformError;
use crate::runtime::contract::{MessageBody, RequestValidationError, ValidationErrorBody};

/// Status used when an upstream failure carries no HTTP status of its own.
pub const UPSTREAM_UNAVAILABLE_STATUS: u16 = 502;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

fn cors_headers() -> Value {
    json!({
        "Access-Control-Allow-Origin": "*",
        "Access-Control-Allow-Methods": "OPTIONS POST",
        "Access-Control-Allow-Headers": "Content-Type",
        "Content-Type": "application/json",
    })
}

/// Extracts the request payload from an API Gateway proxy event. Direct
/// invocations without a `body` key are passed through untouched.
pub fn normalize_apigw_event(event: Value) -> Result<Value, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    let Some(body) = object.get("body") else {
        return Ok(event);
    };

    match body {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(body.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(json!({})),
        Value::String(text) => {
            serde_json::from_str(text).map_err(|error| format!("Malformed JSON body: {error}"))
        }
        _ => Err("Request body must be a JSON object".to_string()),
    }
}

/// HTTP method of a REST (v1) or HTTP (v2) API Gateway event, if any.
pub fn request_method(event: &Value) -> Option<&str> {
    event
        .get("httpMethod")
        .or_else(|| event.pointer("/requestContext/http/method"))
        .and_then(Value::as_str)
}

pub fn is_preflight(event: &Value) -> bool {
    request_method(event)
        .map(|method| method.eq_ignore_ascii_case("OPTIONS"))
        .unwrap_or(false)
}

pub fn preflight_response() -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 200,
        headers: cors_headers(),
        body: String::new(),
    }
}

pub fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string(&payload) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: cors_headers(),
            body,
        },
        Err(error) => message_response(500, format!("Failed to serialize response: {error}")),
    }
}

pub fn error_response(status_code: u16, payload: Value) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: cors_headers(),
        body: payload.to_string(),
    }
}

pub fn message_response(status_code: u16, message: impl Into<String>) -> ApiGatewayResponse {
    error_response(status_code, json!(MessageBody::new(message)))
}

pub fn validation_error_response(error: RequestValidationError) -> ApiGatewayResponse {
    error_response(400, json!(ValidationErrorBody::from(error)))
}

/// Relays an upstream failure with its raw error body. The upstream status is
/// kept when it is an error status; a missing one, or a success status whose
/// body could not be decoded, becomes 502.
pub fn platform_error_response(error: &PlatformError) -> ApiGatewayResponse {
    let status = error
        .status()
        .filter(|status| !(200..300).contains(status))
        .unwrap_or(UPSTREAM_UNAVAILABLE_STATUS);
    error_response(status, error.body())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_accepts_string_object_and_bare_payloads() {
        assert_eq!(
            normalize_apigw_event(json!({"body": "{\"toName\":\"Alex\"}"})),
            Ok(json!({"toName": "Alex"}))
        );
        assert_eq!(
            normalize_apigw_event(json!({"body": {"toName": "Alex"}})),
            Ok(json!({"toName": "Alex"}))
        );
        assert_eq!(
            normalize_apigw_event(json!({"toName": "Alex"})),
            Ok(json!({"toName": "Alex"}))
        );
        assert_eq!(normalize_apigw_event(json!({"body": null})), Ok(json!({})));
        assert_eq!(normalize_apigw_event(json!({"body": ""})), Ok(json!({})));
    }

    #[test]
    fn normalize_rejects_malformed_bodies() {
        let error = normalize_apigw_event(json!({"body": "{oops"})).expect_err("should fail");
        assert!(error.starts_with("Malformed JSON body"));
        assert!(normalize_apigw_event(json!([1])).is_err());
        assert!(normalize_apigw_event(json!({"body": 7})).is_err());
    }

    #[test]
    fn detects_preflight_for_rest_and_http_apis() {
        assert!(is_preflight(&json!({"httpMethod": "OPTIONS"})));
        assert!(is_preflight(
            &json!({"requestContext": {"http": {"method": "options"}}})
        ));
        assert!(!is_preflight(&json!({"httpMethod": "POST"})));
        assert!(!is_preflight(&json!({})));
    }

    #[test]
    fn responses_carry_cors_headers() {
        let response = message_response(500, "boom");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.json_body(), json!({"message": "boom"}));
    }

    #[test]
    fn platform_errors_without_status_map_to_bad_gateway() {
        let response =
            platform_error_response(&PlatformError::Transport("timed out".to_string()));
        assert_eq!(response.status_code, UPSTREAM_UNAVAILABLE_STATUS);
        assert_eq!(response.json_body(), json!({"message": "timed out"}));
    }

    #[test]
    fn undecodable_success_body_maps_to_bad_gateway() {
        let response = platform_error_response(&PlatformError::Decode {
            status: 201,
            message: "missing field `sid`".to_string(),
        });
        assert_eq!(response.status_code, UPSTREAM_UNAVAILABLE_STATUS);
        assert_eq!(response.json_body()["message"], "missing field `sid`");
    }

    #[test]
    fn platform_error_status_is_relayed() {
        let response = platform_error_response(&PlatformError::Decode {
            status: 503,
            message: "upstream unavailable".to_string(),
        });
        assert_eq!(response.status_code, 503);
    }
}
