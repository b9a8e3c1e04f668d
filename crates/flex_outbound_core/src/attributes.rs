use serde_json::{Map, Value};
use thiserror::Error;

pub const STATUS_ATTRIBUTE: &str = "status";
pub const INACTIVE_STATUS: &str = "INACTIVE";

#[derive(Debug, Error)]
pub enum AttributesError {
    #[error("channel attributes are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("channel attributes must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Marks a chat channel's attributes inactive so the platform stops reusing it.
///
/// Every other attribute is preserved. Empty or `null` attributes start from
/// an empty object.
pub fn deactivate_channel_attributes(raw: Option<&str>) -> Result<String, AttributesError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    let mut attributes = if raw.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(AttributesError::NotAnObject(json_kind(&other))),
        }
    };

    attributes.insert(
        STATUS_ATTRIBUTE.to_string(),
        Value::String(INACTIVE_STATUS.to_string()),
    );
    Ok(Value::Object(attributes).to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parsed(raw: &str) -> Value {
        serde_json::from_str(raw).expect("output should be JSON")
    }

    #[test]
    fn overrides_status_and_keeps_other_keys() {
        let updated = deactivate_channel_attributes(Some(
            r#"{"status":"ACTIVE","from":"+15559876543","proxySession":"KC1"}"#,
        ))
        .expect("should rewrite");

        assert_eq!(
            parsed(&updated),
            json!({"status": "INACTIVE", "from": "+15559876543", "proxySession": "KC1"})
        );
    }

    #[test]
    fn empty_and_null_attributes_become_status_only() {
        for raw in [None, Some(""), Some("  "), Some("null")] {
            let updated = deactivate_channel_attributes(raw).expect("should rewrite");
            assert_eq!(parsed(&updated), json!({"status": "INACTIVE"}));
        }
    }

    #[test]
    fn rejects_non_object_attributes() {
        let error = deactivate_channel_attributes(Some("[1,2]")).expect_err("should fail");
        assert!(error.to_string().contains("an array"));
    }

    #[test]
    fn rejects_malformed_attributes() {
        let error = deactivate_channel_attributes(Some("{status:")).expect_err("should fail");
        assert!(matches!(error, AttributesError::Malformed(_)));
    }
}
