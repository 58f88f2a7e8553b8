//! Shallow merge of JSON records.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Overlay `patch`'s fields onto `base`, one level deep.
///
/// Same-named fields are overwritten in place, so existing fields keep
/// their position; fields only present in `patch` are appended in the
/// order they appear there. Nested values are replaced wholesale.
pub fn shallow_merge(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Shallow-merge two JSON values that must both be records.
pub fn merge_records(base: Value, patch: Value) -> Result<Value> {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            shallow_merge(&mut base, patch);
            Ok(Value::Object(base))
        }
        (Value::Object(_), other) => Err(StoreError::NotARecord(format!(
            "update must be a record, got {}",
            kind(&other)
        ))),
        (other, _) => Err(StoreError::NotARecord(format!(
            "state must be a record, got {}",
            kind(&other)
        ))),
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "record",
    }
}
