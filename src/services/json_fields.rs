//! Tolerant JSON field access for schema-flexible third-party APIs
//!
//! The remote fetch service and the upload hosts disagree on field names
//! between API versions (and sometimes between endpoints). Each response
//! type declares an ordered list of accepted aliases; the first alias
//! present wins.

use serde_json::Value;

/// Return the first string value found under any of the aliases, in order.
pub fn first_string(value: &Value, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(s) = value.get(alias).and_then(Value::as_str) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}

/// Return the first integer value found under any of the aliases, in order.
///
/// Numeric strings are accepted too; some hosts quote their ids.
pub fn first_i64(value: &Value, aliases: &[&str]) -> Option<i64> {
    for alias in aliases {
        match value.get(alias) {
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Some(i);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(i) = s.parse::<i64>() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
