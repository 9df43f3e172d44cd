//! Minimal dotted-path lookups into vendor responses.
//!
//! Paths look like `$.Instances.Instance` or `Role.RoleName`; a numeric
//! segment indexes into an array (`IpAddress.0`).

use serde_json::Value;

/// Returns the value at `path`, or `None` when any segment is missing.
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// The array at `path`, or an empty slice.
pub fn get_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    match get(value, path) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// String at `path`. Numbers and booleans are rendered, `null` is `None`.
pub fn get_string(value: &Value, path: &str) -> Option<String> {
    get(value, path).and_then(scalar_to_string)
}

/// Integer at `path`, accepting numeric strings.
pub fn get_i64(value: &Value, path: &str) -> Option<i64> {
    match get(value, path)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Boolean at `path`, accepting `"true"`/`"false"`.
pub fn get_bool(value: &Value, path: &str) -> Option<bool> {
    match get(value, path)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Renders a scalar JSON value as a string.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
