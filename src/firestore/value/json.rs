use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::value::{FirestoreValue, ValueKind};

impl FirestoreValue {
    /// Converts a JSON value. Whole numbers that fit in an `i64` become integers, every other
    /// number becomes a double.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(flag) => Self::from_bool(flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::from_integer(integer),
                None => Self::from_double(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => Self::from_string(text),
            Value::Array(items) => Self::from_array(items.into_iter().map(Self::from_json).collect()),
            Value::Object(object) => Self::from_map(
                object
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as JSON. Timestamps become RFC 3339 strings; non-finite doubles become
    /// `null`.
    pub fn to_json(&self) -> Value {
        match self.kind() {
            ValueKind::Null => Value::Null,
            ValueKind::Boolean(flag) => Value::Bool(*flag),
            ValueKind::Integer(integer) => Value::Number(Number::from(*integer)),
            ValueKind::Double(double) => Number::from_f64(*double)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueKind::Timestamp(timestamp) => {
                DateTime::<Utc>::from_timestamp(timestamp.seconds, timestamp.nanos as u32)
                    .map(|time| Value::String(time.to_rfc3339_opts(SecondsFormat::Millis, true)))
                    .unwrap_or(Value::Null)
            }
            ValueKind::String(text) => Value::String(text.clone()),
            ValueKind::Array(array) => {
                Value::Array(array.values().iter().map(FirestoreValue::to_json).collect())
            }
            ValueKind::Map(map) => Value::Object(
                map.fields()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Converts a JSON object into document fields.
pub fn document_from_json(value: Value) -> FirestoreResult<BTreeMap<String, FirestoreValue>> {
    match value {
        Value::Object(object) => Ok(object
            .into_iter()
            .map(|(key, value)| (key, FirestoreValue::from_json(value)))
            .collect()),
        other => Err(invalid_argument(format!(
            "Document data must be a JSON object, got {other}"
        ))),
    }
}
