//! Schema type definitions
//!
//! Supported field types:
//! - string: UTF-8 string
//! - int: numeric value stored as an integer when integral
//! - float: 64-bit floating point
//! - int_array: sequence of numbers
//! - float_array: sequence of floating point numbers
//!
//! On the wire a field type is a small integer code (`STRING=0` through
//! `FLOAT_ARRAY=4`). Codes outside that range are kept as
//! [`FieldType::Unsupported`] so a schema is always stored as sent.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Field type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// UTF-8 string
    String,
    /// Integer (accepts any JSON number)
    Int,
    /// 64-bit floating point (accepts any JSON number)
    Float,
    /// Array of numbers
    IntArray,
    /// Array of floating point numbers
    FloatArray,
    /// A code this broker does not know how to validate
    Unsupported(i64),
}

impl FieldType {
    /// Returns the wire code for this type
    pub fn code(&self) -> i64 {
        match self {
            FieldType::String => 0,
            FieldType::Int => 1,
            FieldType::Float => 2,
            FieldType::IntArray => 3,
            FieldType::FloatArray => 4,
            FieldType::Unsupported(code) => *code,
        }
    }

    /// Maps a wire code to a field type
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FieldType::String,
            1 => FieldType::Int,
            2 => FieldType::Float,
            3 => FieldType::IntArray,
            4 => FieldType::FloatArray,
            other => FieldType::Unsupported(other),
        }
    }

    /// Parses a type name (`"int"`, `"INT_ARRAY"`, ...), case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(FieldType::String),
            "int" => Some(FieldType::Int),
            "float" => Some(FieldType::Float),
            "int_array" => Some(FieldType::IntArray),
            "float_array" => Some(FieldType::FloatArray),
            _ => None,
        }
    }

    /// Returns the type name for log messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::IntArray => "int_array",
            FieldType::FloatArray => "float_array",
            FieldType::Unsupported(_) => "unsupported",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Unsupported(code) => write!(f, "unsupported({})", code),
            other => f.write_str(other.type_name()),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldTypeVisitor)
    }
}

struct FieldTypeVisitor;

impl<'de> Visitor<'de> for FieldTypeVisitor {
    type Value = FieldType;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer field type code or a field type name")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldType, E> {
        Ok(FieldType::from_code(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldType, E> {
        i64::try_from(v)
            .map(FieldType::from_code)
            .map_err(|_| E::custom(format!("field type code out of range: {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldType, E> {
        FieldType::from_name(v).ok_or_else(|| E::custom(format!("unknown field type: {}", v)))
    }
}

/// A named set of typed field declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Field definitions keyed by field identifier
    #[serde(rename = "Fields", alias = "fields", default)]
    pub fields: BTreeMap<String, FieldType>,
}

impl Schema {
    /// Create a schema from field declarations
    pub fn new(fields: BTreeMap<String, FieldType>) -> Self {
        Self { fields }
    }

    /// Builder-style field declaration
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Look up the declared type of a field
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    /// Returns true if the schema declares no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_roundtrip_through_from_code() {
        for code in 0..5 {
            assert_eq!(FieldType::from_code(code).code(), code);
        }
        assert_eq!(FieldType::from_code(9), FieldType::Unsupported(9));
    }

    #[test]
    fn test_deserialize_integer_codes() {
        let schema: Schema = serde_json::from_str(r#"{"Fields": {"A": 1, "B": 0, "C": 4}}"#).unwrap();
        assert_eq!(schema.field_type("A"), Some(FieldType::Int));
        assert_eq!(schema.field_type("B"), Some(FieldType::String));
        assert_eq!(schema.field_type("C"), Some(FieldType::FloatArray));
    }

    #[test]
    fn test_deserialize_names_and_lowercase_key() {
        let schema: Schema =
            serde_json::from_str(r#"{"fields": {"n": "INT_ARRAY", "s": "string"}}"#).unwrap();
        assert_eq!(schema.field_type("n"), Some(FieldType::IntArray));
        assert_eq!(schema.field_type("s"), Some(FieldType::String));
    }

    #[test]
    fn test_unknown_code_is_kept() {
        let schema: Schema = serde_json::from_str(r#"{"Fields": {"x": 42}}"#).unwrap();
        assert_eq!(schema.field_type("x"), Some(FieldType::Unsupported(42)));

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["Fields"]["x"], 42);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let result: Result<Schema, _> = serde_json::from_str(r#"{"Fields": {"x": "bool"}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields_key_is_empty_schema() {
        let schema: Schema = serde_json::from_str("{}").unwrap();
        assert!(schema.is_empty());
    }
}
