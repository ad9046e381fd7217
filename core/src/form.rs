//! `application/x-www-form-urlencoded` encoding of JSON values.
//!
//! Used both for query strings and for form bodies. Keys keep the object's
//! insertion order. Arrays repeat the key once per element; nested objects
//! and nulls encode as an empty value.

use serde_json::Value;

/// Encodes a JSON object as `k=v&k2=v2`. Non-object values encode as "".
pub fn encode(value: &Value) -> String {
    let Value::Object(map) = value else {
        return String::new();
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let key = urlencoding::encode(key);
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push(format!("{key}={}", urlencoding::encode(&scalar(item))));
                }
            }
            other => pairs.push(format!("{key}={}", urlencoding::encode(&scalar(other)))),
        }
    }
    pairs.join("&")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}
