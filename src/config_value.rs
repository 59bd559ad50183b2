//! Destination config values.
//!
//! Declared config entries carry their value as a string; the API wants a
//! native JSON value. Decoding tries a JSON object, then a JSON array, and
//! otherwise keeps the raw string. Encoding writes strings as-is and
//! everything else as compact JSON. Zero values (null, "", false, 0) have
//! no encoded form, so they show up as an absent `value`.

use serde_json::Value;

/// Turn a declared string into the value sent to the API.
pub fn decode(raw: &str) -> Value {
    if let Ok(object) = serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
        return Value::Object(object);
    }
    if let Ok(array) = serde_json::from_str::<Vec<Value>>(raw) {
        return Value::Array(array);
    }
    Value::String(raw.to_string())
}

/// Turn an API value into its declared string, `None` for zero values.
pub fn encode(value: &Value) -> Option<String> {
    if is_zero(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Whether `value` is the zero value of its JSON type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Canonical declared form of a raw string, for comparisons.
pub fn normalize(raw: Option<&str>) -> Option<String> {
    raw.and_then(|raw| encode(&decode(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_round_trip() {
        let value = json!({"url": "https://example.com", "headers": {"x": "1"}});
        assert_eq!(decode(&encode(&value).unwrap()), value);
    }

    #[test]
    fn test_array_round_trip() {
        let value = json!([{"key": "a", "value": "b"}, 3, "c"]);
        assert_eq!(decode(&encode(&value).unwrap()), value);
    }

    #[test]
    fn test_object_takes_precedence() {
        assert!(decode(r#"{"a": [1, 2]}"#).is_object());
        assert!(decode("[{}]").is_array());
    }

    #[test]
    fn test_plain_strings_pass_through() {
        assert_eq!(decode("https://hook"), json!("https://hook"));
        assert_eq!(decode("42"), json!("42"));
        assert_eq!(decode("true"), json!("true"));
        assert_eq!(decode("{not json"), json!("{not json"));
        assert_eq!(encode(&json!("https://hook")).as_deref(), Some("https://hook"));
    }

    #[test]
    fn test_zero_values_are_absent() {
        for zero in [json!(null), json!(""), json!(false), json!(0)] {
            assert_eq!(encode(&zero), None, "{zero}");
        }
        assert_eq!(normalize(Some("")), None);
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_empty_collections_are_kept() {
        assert_eq!(encode(&json!({})).as_deref(), Some("{}"));
        assert_eq!(encode(&json!([])).as_deref(), Some("[]"));
    }

    #[test]
    fn test_normalize_canonicalises_json() {
        assert_eq!(
            normalize(Some("{ \"b\": 1,\n  \"a\": 2 }")).as_deref(),
            Some(r#"{"a":2,"b":1}"#)
        );
        assert_eq!(normalize(Some("plain")).as_deref(), Some("plain"));
    }

    #[test]
    fn test_non_string_scalars_encode_as_json() {
        assert_eq!(encode(&json!(true)).as_deref(), Some("true"));
        assert_eq!(encode(&json!(1.5)).as_deref(), Some("1.5"));
    }
}
