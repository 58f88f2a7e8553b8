use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::merge::shallow_merge;

/// A value held by the dynamic store.
///
/// Serialized as the plain JSON it wraps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum DynamicValue {
    /// `null`, a boolean, a number or a string.
    Scalar(Value),
    /// An ordered list.
    Sequence(Vec<Value>),
    /// Named fields, kept in insertion order.
    Record(Map<String, Value>),
}

impl DynamicValue {
    /// Convert any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Combine the value currently stored under a key with an update.
    ///
    /// Two sequences concatenate (existing elements first, duplicates
    /// kept). Two records merge one level deep, with `incoming` winning on
    /// shared fields. Every other pairing, including a missing current
    /// value or a sequence meeting a record, yields `incoming` unchanged.
    pub fn merge(current: Option<DynamicValue>, incoming: DynamicValue) -> DynamicValue {
        match (current, incoming) {
            (Some(DynamicValue::Sequence(mut existing)), DynamicValue::Sequence(new)) => {
                existing.extend(new);
                DynamicValue::Sequence(existing)
            }
            (Some(DynamicValue::Record(mut existing)), DynamicValue::Record(new)) => {
                shallow_merge(&mut existing, new);
                DynamicValue::Record(existing)
            }
            (_, incoming) => incoming,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, DynamicValue::Scalar(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, DynamicValue::Sequence(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self, DynamicValue::Record(_))
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            DynamicValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Map<String, Value>> {
        match self {
            DynamicValue::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        self.into()
    }
}

impl From<Value> for DynamicValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => DynamicValue::Sequence(items),
            Value::Object(fields) => DynamicValue::Record(fields),
            scalar => DynamicValue::Scalar(scalar),
        }
    }
}

impl From<DynamicValue> for Value {
    fn from(value: DynamicValue) -> Self {
        match value {
            DynamicValue::Scalar(scalar) => scalar,
            DynamicValue::Sequence(items) => Value::Array(items),
            DynamicValue::Record(fields) => Value::Object(fields),
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for DynamicValue {
                fn from(value: $ty) -> Self {
                    DynamicValue::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_from!(bool, i32, i64, u32, u64, f64, String, &str);

impl PartialEq<Value> for DynamicValue {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (DynamicValue::Scalar(a), b) => a == b,
            (DynamicValue::Sequence(a), Value::Array(b)) => a == b,
            (DynamicValue::Record(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge(current: Value, incoming: Value) -> DynamicValue {
        DynamicValue::merge(Some(current.into()), incoming.into())
    }

    #[test]
    fn classifies_json() {
        assert!(DynamicValue::from(json!([1])).is_sequence());
        assert!(DynamicValue::from(json!({"a": 1})).is_record());
        assert!(DynamicValue::from(json!(null)).is_scalar());
        assert!(DynamicValue::from(json!("s")).is_scalar());
    }

    #[test]
    fn sequences_concatenate_keeping_duplicates() {
        assert_eq!(merge(json!([1, 2]), json!([2, 3])), json!([1, 2, 2, 3]));
    }

    #[test]
    fn records_merge_shallowly_in_order() {
        let merged = merge(
            json!({"a": 1, "nested": {"x": 1}, "b": 2}),
            json!({"c": 3, "nested": {"y": 2}, "a": 9}),
        );
        assert_eq!(merged, json!({"a": 9, "nested": {"y": 2}, "b": 2, "c": 3}));

        let keys: Vec<&str> = merged
            .as_record()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "nested", "b", "c"]);
    }

    #[test]
    fn mismatched_kinds_overwrite() {
        assert_eq!(merge(json!([1, 2]), json!({"a": 1})), json!({"a": 1}));
        assert_eq!(merge(json!({"a": 1}), json!([1])), json!([1]));
        assert_eq!(merge(json!({"a": 1}), json!(null)), json!(null));
        assert_eq!(merge(json!(5), json!([1])), json!([1]));
        assert_eq!(merge(json!("x"), json!(6)), json!(6));
    }

    #[test]
    fn missing_current_takes_incoming() {
        assert_eq!(DynamicValue::merge(None, json!([1]).into()), json!([1]));
        assert_eq!(DynamicValue::merge(None, 42.into()), json!(42));
    }

    #[test]
    fn serializes_as_plain_json() {
        let value = DynamicValue::from(json!({"list": [1, "two"]}));
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"list":[1,"two"]}"#
        );

        let back: DynamicValue = serde_json::from_str("[true, null]").unwrap();
        assert_eq!(back, DynamicValue::Sequence(vec![json!(true), json!(null)]));
    }

    #[test]
    fn from_serialize_uses_serde() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let value = DynamicValue::from_serialize(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(value, json!({"x": 1, "y": 2}));
    }
}
