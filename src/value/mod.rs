//! Value helpers over `sea_query::Value`
//!
//! Attribute values, foreign keys and query operands are all `sea_query::Value`.
//! Stores compare them through [`same`] and [`compare`] so that integer keys match
//! regardless of the integer width they were written with.

use sea_query::Value;
use std::cmp::Ordering;

/// Extract an integer key from a value
///
/// Accepts every integer variant; unsigned values above `i64::MAX` and all
/// non-integer variants return `None`.
pub fn as_id(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(Some(v)) => Some(i64::from(*v)),
        Value::SmallInt(Some(v)) => Some(i64::from(*v)),
        Value::Int(Some(v)) => Some(i64::from(*v)),
        Value::BigInt(Some(v)) => Some(*v),
        Value::TinyUnsigned(Some(v)) => Some(i64::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(i64::from(*v)),
        Value::Unsigned(Some(v)) => Some(i64::from(*v)),
        Value::BigUnsigned(Some(v)) => i64::try_from(*v).ok(),
        _ => None,
    }
}

/// Key value for an optional id (`NULL` when absent)
pub fn id_value(id: Option<i64>) -> Value {
    Value::BigInt(id)
}

/// Typed `NULL` used when clearing foreign keys
pub fn null_key() -> Value {
    Value::BigInt(None)
}

/// Typed `NULL` used when clearing polymorphic discriminators
pub fn null_text() -> Value {
    Value::String(None)
}

/// True when the value is SQL `NULL`
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
    )
}

/// True for `NULL`, empty strings and empty byte strings
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(Some(s)) => s.trim().is_empty(),
        Value::Bytes(Some(b)) => b.is_empty(),
        other => is_null(other),
    }
}

/// Equality used by stores and change detection
///
/// Integers compare numerically across widths and any two `NULL`s are equal.
pub fn same(a: &Value, b: &Value) -> bool {
    if is_null(a) || is_null(b) {
        return is_null(a) && is_null(b);
    }
    match (as_id(a), as_id(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for range filters, `None` when the values are not comparable
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_id(a), as_id(b)) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (as_float(a), as_float(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(Some(x)), Value::String(Some(y))) => Some(x.cmp(y)),
        (Value::Bool(Some(x)), Value::Bool(Some(y))) => Some(x.cmp(y)),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(v)) => Some(f64::from(*v)),
        Value::Double(Some(v)) => Some(*v),
        other => as_id(other).map(|v| v as f64),
    }
}

/// Render a value for messages and logs (not for SQL)
pub fn display(value: &Value) -> String {
    if is_null(value) {
        return "NULL".to_string();
    }
    if let Some(id) = as_id(value) {
        return id.to_string();
    }
    match value {
        Value::Bool(Some(b)) => b.to_string(),
        Value::Float(Some(f)) => f.to_string(),
        Value::Double(Some(d)) => d.to_string(),
        Value::String(Some(s)) => s.clone(),
        Value::Char(Some(c)) => c.to_string(),
        Value::Bytes(Some(b)) => String::from_utf8_lossy(b).into_owned(),
        Value::Json(Some(j)) => j.to_string(),
        other => format!("{other:?}"),
    }
}
