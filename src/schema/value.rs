//! Typed field values
//!
//! Values arrive as untyped JSON and are coerced against the declared
//! [`FieldType`] before they are stored. The stored form is always one of the
//! variants below; on the wire they serialize as plain JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::FieldType;

/// A stored instance field value
///
/// Deserializing without a schema picks the first variant that fits, so
/// the wire alone cannot tell an empty FLOAT_ARRAY from an empty INT_ARRAY
/// (both decode as `IntArray(vec![])`) or a whole-number FLOAT from an INT.
/// Use [`FieldValue::coerce`] with the declared type when the distinction
/// matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text value
    Text(String),
    /// Integral number
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Sequence of integral numbers
    IntArray(Vec<i64>),
    /// Sequence of floating point numbers
    FloatArray(Vec<f64>),
    /// Placeholder for fields whose type is unsupported
    Null,
}

impl FieldValue {
    /// Default value seeded into a new instance for a field type
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String => FieldValue::Text(String::new()),
            FieldType::Int => FieldValue::Int(0),
            FieldType::Float => FieldValue::Float(0.0),
            FieldType::IntArray => FieldValue::IntArray(Vec::new()),
            FieldType::FloatArray => FieldValue::FloatArray(Vec::new()),
            FieldType::Unsupported(_) => FieldValue::Null,
        }
    }

    /// Coerce a decoded JSON value into a typed value
    ///
    /// Returns `None` when the value does not conform to `field_type`.
    pub fn coerce(value: &Value, field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::String => value.as_str().map(|s| FieldValue::Text(s.to_string())),
            FieldType::Int => match integral(value) {
                Some(i) => Some(FieldValue::Int(i)),
                None => value.as_f64().map(FieldValue::Float),
            },
            FieldType::Float => value.as_f64().map(FieldValue::Float),
            FieldType::IntArray => {
                let items = value.as_array()?;
                let ints: Option<Vec<i64>> = items.iter().map(integral).collect();
                match ints {
                    Some(ints) => Some(FieldValue::IntArray(ints)),
                    None => floats(items).map(FieldValue::FloatArray),
                }
            }
            FieldType::FloatArray => floats(value.as_array()?).map(FieldValue::FloatArray),
            FieldType::Unsupported(_) => None,
        }
    }
}

/// Integral view of a JSON number, including floats with no fractional part
fn integral(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    let f = value.as_f64()?;
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn floats(items: &[Value]) -> Option<Vec<f64>> {
    items.iter().map(Value::as_f64).collect()
}
