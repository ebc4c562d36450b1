//! Normalization of n8n webhook responses.
//!
//! n8n returns whatever the last node of a workflow produced: a single JSON
//! object ("First Entry JSON"), an array of node items (legacy "All Entries"
//! configurations), a bare scalar, or nothing at all. Callers of the relay
//! expect one `result` value. [`extract_result`] applies a fixed,
//! first-match-wins set of lookups to pull that value out:
//!
//! | Shape | Result |
//! |-------|--------|
//! | object with `output` | `output` |
//! | object with `response` | `response` |
//! | object with `json.output` | `json.output` |
//! | object with `data.{*}.json.output` | first such `output` in document order |
//! | any other object | the object itself |
//! | non-empty array | `json.output` of the last item, else the last item |
//! | empty array | [`EMPTY_ARRAY_SENTINEL`] |
//! | `null` | [`NO_DATA_SENTINEL`] |
//! | scalar | its string form |
//!
//! The sentinel strings are part of the contract with existing front-ends
//! and must not change.

use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Returned when n8n answers with an empty array.
pub const EMPTY_ARRAY_SENTINEL: &str = "n8n返回空数组";

/// Returned when n8n answers with `null` or an empty body.
pub const NO_DATA_SENTINEL: &str = "n8n未返回有效数据";

/// Extract the single result value from a decoded n8n response.
///
/// Never fails: every JSON shape maps to some value.
pub fn extract_result(response: &Value) -> Value {
    match response {
        Value::Object(map) => extract_from_object(map),
        Value::Array(items) => extract_from_array(items),
        Value::Null => Value::String(NO_DATA_SENTINEL.to_string()),
        Value::String(text) => Value::String(text.clone()),
        scalar => Value::String(scalar.to_string()),
    }
}

/// Decode a raw n8n response body and extract its result.
///
/// An empty (or whitespace-only) body is treated as `null`. A body that is
/// not valid JSON cannot be inspected; it is returned unchanged as a string
/// and the decode failure is logged.
pub fn normalize_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        debug!("n8n returned an empty body");
        return extract_result(&Value::Null);
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(decoded) => extract_result(&decoded),
        Err(e) => {
            warn!(
                error = %e,
                body_len = body.len(),
                "n8n response is not valid JSON; returning raw body"
            );
            Value::String(String::from_utf8_lossy(body).into_owned())
        }
    }
}

fn extract_from_object(map: &Map<String, Value>) -> Value {
    if let Some(output) = map.get("output") {
        return output.clone();
    }

    if let Some(response) = map.get("response") {
        return response.clone();
    }

    if let Some(output) = nested_json_output(map) {
        return output.clone();
    }

    if let Some(Value::Object(data)) = map.get("data") {
        let found = data.values().find_map(|entry| match entry {
            Value::Object(item) => nested_json_output(item),
            _ => None,
        });
        if let Some(output) = found {
            return output.clone();
        }
    }

    debug!(
        keys = ?map.keys().collect::<Vec<_>>(),
        "n8n object matched no known result field; returning it whole"
    );
    Value::Object(map.clone())
}

fn extract_from_array(items: &[Value]) -> Value {
    let Some(last) = items.last() else {
        return Value::String(EMPTY_ARRAY_SENTINEL.to_string());
    };

    if let Value::Object(item) = last {
        if let Some(output) = nested_json_output(item) {
            return output.clone();
        }
    }

    last.clone()
}

/// `map.json.output`, when `json` is an object that has an `output` key.
fn nested_json_output(map: &Map<String, Value>) -> Option<&Value> {
    match map.get("json") {
        Some(Value::Object(json)) => json.get("output"),
        _ => None,
    }
}

#[cfg(test)]
#[path = "normalizer_tests.rs"]
mod tests;
