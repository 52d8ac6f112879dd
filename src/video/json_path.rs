//! Dotted JSON paths (`output[0].url`, `data.task.id`) over arbitrary
//! provider responses.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// A path token is either an object key or a bracketed array index.
/// Characters matching neither (stray `[`, `]`, `.`) are skipped.
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\[\].]+)|\[(\d+)\]").expect("static regex"));

/// Walk `path` through `payload`.
///
/// Returns `None` for an empty path, a missing key, an out-of-range index,
/// a type mismatch (key on a non-object, index on a non-array) or any `null`
/// met along the way.
pub fn extract<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = payload;
    for caps in TOKEN.captures_iter(path) {
        current = if let Some(key) = caps.get(1) {
            current.as_object()?.get(key.as_str())?
        } else {
            let index: usize = caps.get(2)?.as_str().parse().ok()?;
            current.as_array()?.get(index)?
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Render an extracted value as text: strings verbatim, scalars via their
/// display form, arrays and objects as compact JSON; `default` when absent.
pub fn as_text(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Shorthand for `as_text(extract(payload, path), default)`.
pub fn extract_text(payload: &Value, path: &str, default: &str) -> String {
    as_text(extract(payload, path), default)
}
