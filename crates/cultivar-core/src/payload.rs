//! Batch request detection.
//!
//! A payload is "one or more records": a JSON object is a single record, a
//! JSON array is a batch. The caller never declares which.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("payload must be a JSON object or an array of objects, got {0}")]
    NotRecordOrList(&'static str),
}

/// One or many input records, borrowed from the request payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchRequest<'a> {
    Single(&'a Value),
    Batch(&'a [Value]),
}

impl<'a> BatchRequest<'a> {
    /// Classify a payload structurally.
    pub fn detect(payload: &'a Value) -> Result<Self, PayloadError> {
        match payload {
            Value::Object(_) => Ok(Self::Single(payload)),
            Value::Array(items) => Ok(Self::Batch(items)),
            other => Err(PayloadError::NotRecordOrList(json_type(other))),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records in input order.
    pub fn records(&self) -> &'a [Value] {
        match *self {
            Self::Single(record) => std::slice::from_ref(record),
            Self::Batch(items) => items,
        }
    }
}

/// Strip the upload envelopes accepted by the dashboard.
///
/// `{"input_batch": [...]}` → the list, `{"input": {...}}` → the record,
/// anything else is returned unchanged.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => {
            if obj.get("input_batch").is_some_and(Value::is_array) {
                return obj.remove("input_batch").unwrap_or_default();
            }
            if obj.get("input").is_some_and(Value::is_object) {
                return obj.remove("input").unwrap_or_default();
            }
            Value::Object(obj)
        }
        other => other,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
