//! Tolerant readers for cloud payload values
//!
//! The cloud sends the same field as a number on one model and as a string
//! on another; these helpers accept both.

use serde_json::{Map, Value};

pub type Object = Map<String, Value>;

/// Non-empty string; numbers and booleans are rendered
pub fn text(obj: &Object, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn float(obj: &Object, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn int(obj: &Object, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Booleans, `0`/`1`, `"true"`/`"false"` and the cloud's `OPEN`/`CLOSE`/`LOCK` words
pub fn flag(obj: &Object, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "TRUE" | "1" | "OPEN" | "ON" | "LOCK" => Some(true),
            "FALSE" | "0" | "CLOSE" | "OFF" | "UNLOCK" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Nested object, if present
pub fn object<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key).and_then(Value::as_object)
}

/// Error text unless the device reports no error
pub fn error_message(detail: &Object) -> Option<String> {
    let kind = text(detail, "currentErrorType").unwrap_or_else(|| "NONE".to_string());
    match text(detail, "currentErrorMessage") {
        Some(message) if kind != "NONE" => Some(message),
        _ => text(detail, "error").filter(|e| e != "NORMAL" && e != "NONE"),
    }
}

/// First log line as `"{time} {event} {firstSection} {secondSection}"`
pub fn last_log(logs: Option<&Value>) -> Option<String> {
    let first = logs?.as_array()?.first()?.as_object()?;
    let line = ["time", "event", "firstSection", "secondSection"]
        .iter()
        .filter_map(|k| text(first, k))
        .collect::<Vec<_>>()
        .join(" ");
    (!line.is_empty()).then_some(line)
}
