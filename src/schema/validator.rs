//! Field validator
//!
//! Decides whether a candidate value conforms to a declared field type.
//!
//! Validation semantics:
//! - STRING accepts JSON strings only
//! - INT and FLOAT accept any JSON number (the wire does not distinguish them)
//! - INT_ARRAY and FLOAT_ARRAY accept arrays whose elements are all numbers
//! - unsupported types accept nothing
//!
//! The validator never panics and never mutates its input.

use serde_json::Value;

use super::types::FieldType;
use super::value::FieldValue;

/// Returns true if `value` may be stored in a field of `field_type`
pub fn value_conforms(value: &Value, field_type: FieldType) -> bool {
    FieldValue::coerce(value, field_type).is_some()
}

/// Returns the JSON type name of a value, for log messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_rules() {
        assert!(value_conforms(&json!("x"), FieldType::String));
        assert!(value_conforms(&json!(""), FieldType::String));
        assert!(!value_conforms(&json!(1), FieldType::String));
        assert!(!value_conforms(&json!(null), FieldType::String));
    }

    #[test]
    fn test_int_and_float_accept_both_number_forms() {
        for field_type in [FieldType::Int, FieldType::Float] {
            assert!(value_conforms(&json!(1), field_type));
            assert!(value_conforms(&json!(-1), field_type));
            assert!(value_conforms(&json!(1.25), field_type));
            assert!(!value_conforms(&json!("1"), field_type));
            assert!(!value_conforms(&json!(true), field_type));
            assert!(!value_conforms(&json!([1]), field_type));
        }
    }

    /// Array types validate as "sequence of numbers", not left unhandled.
    #[test]
    fn test_array_rules_are_sequence_of_numbers() {
        for field_type in [FieldType::IntArray, FieldType::FloatArray] {
            assert!(value_conforms(&json!([]), field_type));
            assert!(value_conforms(&json!([1, 2.5, -3]), field_type));
            assert!(!value_conforms(&json!(["a"]), field_type));
            assert!(!value_conforms(&json!([[1]]), field_type));
            assert!(!value_conforms(&json!({"0": 1}), field_type));
            assert!(!value_conforms(&json!(1), field_type));
        }
    }

    #[test]
    fn test_unsupported_type_rejects_everything() {
        let t = FieldType::Unsupported(99);
        for v in [json!(null), json!(1), json!("s"), json!([]), json!({})] {
            assert!(!value_conforms(&v, t));
        }
    }

    #[test]
    fn test_json_type_name() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(1)), "number");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
