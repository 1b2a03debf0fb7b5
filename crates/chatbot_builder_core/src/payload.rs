//! crates/chatbot_builder_core/src/payload.rs
//!
//! Field-level validation for JSON request bodies.
//!
//! Partial updates must distinguish a key that is absent from one that is
//! explicitly `null`, so bodies are read as raw [`Value`]s rather than
//! deserialized into structs. Numeric fields accept a JSON number or a numeric
//! string; anything that fails to parse is rejected, never silently defaulted.

use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::UnknownVariant;
use crate::error::{ServiceError, ServiceResult};
use crate::ports::Record;

pub fn object(body: &Value) -> ServiceResult<&Record> {
    body.as_object()
        .ok_or_else(|| ServiceError::validation("Request body must be a JSON object"))
}

/// Whether a key was sent, sent as `null`, or sent with a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Absent,
    Null,
    Present(&'a Value),
}

pub fn field<'a>(obj: &'a Record, key: &str) -> Field<'a> {
    match obj.get(key) {
        None => Field::Absent,
        Some(Value::Null) => Field::Null,
        Some(value) => Field::Present(value),
    }
}

fn expect_string<'a>(key: &str, value: &'a Value) -> ServiceResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ServiceError::validation(format!("{key} must be a string")))
}

/// A string that must be present and not blank.
pub fn required_text(obj: &Record, key: &str, missing: &str) -> ServiceResult<String> {
    match field(obj, key) {
        Field::Absent | Field::Null => Err(ServiceError::validation(missing)),
        Field::Present(value) => {
            let text = expect_string(key, value)?;
            if text.trim().is_empty() {
                Err(ServiceError::validation(missing))
            } else {
                Ok(text.to_string())
            }
        }
    }
}

/// An optional string for a non-nullable column. `null` is rejected.
pub fn optional_text(obj: &Record, key: &str) -> ServiceResult<Option<String>> {
    match field(obj, key) {
        Field::Absent => Ok(None),
        Field::Null => Err(ServiceError::validation(format!("{key} must not be null"))),
        Field::Present(value) => expect_string(key, value).map(|s| Some(s.to_string())),
    }
}

/// An optional string for a nullable column: `Some(None)` means "set to null".
pub fn nullable_text(obj: &Record, key: &str) -> ServiceResult<Option<Option<String>>> {
    match field(obj, key) {
        Field::Absent => Ok(None),
        Field::Null => Ok(Some(None)),
        Field::Present(value) => expect_string(key, value).map(|s| Some(Some(s.to_string()))),
    }
}

pub fn optional_bool(obj: &Record, key: &str) -> ServiceResult<Option<bool>> {
    match field(obj, key) {
        Field::Absent => Ok(None),
        Field::Present(Value::Bool(b)) => Ok(Some(*b)),
        _ => Err(ServiceError::validation(format!("{key} must be a boolean"))),
    }
}

/// An optional JSON object (settings, metadata).
pub fn optional_object(obj: &Record, key: &str) -> ServiceResult<Option<Value>> {
    match field(obj, key) {
        Field::Absent => Ok(None),
        Field::Present(value @ Value::Object(_)) => Ok(Some(value.clone())),
        _ => Err(ServiceError::validation(format!("{key} must be a JSON object"))),
    }
}

pub fn parse_uuid(raw: &str, key: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::validation(format!("{key} is not a valid id")))
}

pub fn optional_uuid(obj: &Record, key: &str) -> ServiceResult<Option<Uuid>> {
    match field(obj, key) {
        Field::Absent | Field::Null => Ok(None),
        Field::Present(value) => parse_uuid(expect_string(key, value)?, key).map(Some),
    }
}

pub fn required_uuid(obj: &Record, key: &str, missing: &str) -> ServiceResult<Uuid> {
    optional_uuid(obj, key)?.ok_or_else(|| ServiceError::validation(missing))
}

/// A member of a closed string enum.
pub fn optional_enum<T>(obj: &Record, key: &str) -> ServiceResult<Option<T>>
where
    T: FromStr<Err = UnknownVariant>,
{
    match field(obj, key) {
        Field::Absent => Ok(None),
        Field::Null => Err(ServiceError::validation(format!("{key} must not be null"))),
        Field::Present(value) => expect_string(key, value)?
            .parse::<T>()
            .map(Some)
            .map_err(|e| ServiceError::validation(e.to_string())),
    }
}

pub fn coerce_temperature(value: &Value) -> ServiceResult<f64> {
    let invalid = || ServiceError::validation("temperature must be a number between 0 and 1");
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if parsed.is_finite() && (0.0..=1.0).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(invalid())
    }
}

pub fn coerce_max_tokens(value: &Value) -> ServiceResult<i32> {
    let invalid = || ServiceError::validation("max_tokens must be a positive integer");
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    i32::try_from(parsed)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(invalid)
}

/// Applies `coerce` when the key is present. Absence yields `None`; `null`
/// goes through `coerce` and is rejected there.
pub fn optional_coerced<T>(
    obj: &Record,
    key: &str,
    coerce: fn(&Value) -> ServiceResult<T>,
) -> ServiceResult<Option<T>> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => coerce(value).map(Some),
    }
}
