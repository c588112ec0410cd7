//! Typed payloads carried in the envelope's `Msg` field
//!
//! Field names are PascalCase on the wire. The camelCase spellings are
//! accepted on input.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::instance::{AppliedChanges, Instance};
use crate::schema::Schema;

// ==================
// Requests
// ==================

/// `auth` payload. Accepted but not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "Id", alias = "id", default)]
    pub id: String,
}

/// `sub` / `unsub` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRequest {
    /// Topic (schema id) or instance id
    #[serde(rename = "Id", alias = "id")]
    pub id: String,

    /// Only the JSON boolean `true` selects a topic
    #[serde(rename = "IsTopic", alias = "isTopic", default)]
    pub is_topic: Value,
}

impl SubRequest {
    /// Build a request
    pub fn new(id: impl Into<String>, is_topic: bool) -> Self {
        Self {
            id: id.into(),
            is_topic: Value::Bool(is_topic),
        }
    }

    /// Whether the key is a topic; anything but `true` means an instance key
    pub fn is_topic(&self) -> bool {
        self.is_topic == Value::Bool(true)
    }
}

/// `schema-set` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSetRequest {
    #[serde(rename = "SchemaId", alias = "schemaId")]
    pub schema_id: String,

    #[serde(rename = "Schema", alias = "schema", default)]
    pub schema: Schema,
}

/// `schema-get` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaGetRequest {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,
}

/// `inst` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstRequest {
    #[serde(rename = "SchemaId", alias = "schemaId")]
    pub schema_id: String,
}

/// `mut` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutRequest {
    /// Target instance id
    #[serde(rename = "Id", alias = "id")]
    pub id: String,

    /// Field changes, validated against the instance's schema; `null`
    /// reads as no changes
    #[serde(
        rename = "Change",
        alias = "change",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub change: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

// ==================
// Responses
// ==================

/// `list` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(rename = "Topics", alias = "topics", default)]
    pub topics: Vec<String>,
}

/// `schema-get` response; unknown ids carry an empty schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaGetResponse {
    #[serde(rename = "Id", alias = "id")]
    pub id: String,

    #[serde(rename = "Schema", alias = "schema", default)]
    pub schema: Schema,
}

/// `inst` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstResponse {
    #[serde(rename = "InstanceId", alias = "instanceId")]
    pub instance_id: String,

    #[serde(rename = "Instance", alias = "instance")]
    pub instance: Instance,
}

/// `mut` broadcast pushed to instance subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationBroadcast {
    /// Mutated instance id
    #[serde(rename = "Id", alias = "id")]
    pub id: String,

    /// Exactly the fields that were applied
    #[serde(rename = "Change", alias = "change", default)]
    pub change: AppliedChanges,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mut_change_null_or_missing_is_empty() {
        for body in [
            json!({"Id": "1", "Change": null}),
            json!({"Id": "1"}),
            json!({"id": "1", "change": {}}),
        ] {
            let msg: MutRequest = serde_json::from_value(body).unwrap();
            assert_eq!(msg.id, "1");
            assert!(msg.change.is_empty());
        }

        let err = serde_json::from_value::<MutRequest>(json!({"Id": "1", "Change": [1]}));
        assert!(err.is_err());
    }

    #[test]
    fn test_sub_is_topic_only_for_boolean_true() {
        let cases = [
            (json!({"Id": "a", "IsTopic": true}), true),
            (json!({"Id": "a", "IsTopic": false}), false),
            (json!({"Id": "a"}), false),
            (json!({"Id": "a", "IsTopic": "true"}), false),
            (json!({"Id": "a", "IsTopic": 1}), false),
            (json!({"id": "a", "isTopic": true}), true),
        ];
        for (payload, expected) in cases {
            let req: SubRequest = serde_json::from_value(payload.clone()).unwrap();
            assert_eq!(req.is_topic(), expected, "payload {}", payload);
        }
    }

    #[test]
    fn test_schema_set_decodes_client_shape() {
        let req: SchemaSetRequest = serde_json::from_value(json!({
            "SchemaId": "test",
            "Schema": {"Fields": {"A": 1, "B": 1}}
        }))
        .unwrap();
        assert_eq!(req.schema_id, "test");
        assert_eq!(req.schema.fields.len(), 2);
    }

    #[test]
    fn test_mut_requires_id() {
        let result: Result<MutRequest, _> = serde_json::from_value(json!({"Change": {}}));
        assert!(result.is_err());

        let req: MutRequest = serde_json::from_value(json!({"Id": "1"})).unwrap();
        assert!(req.change.is_empty());
    }

    #[test]
    fn test_list_response_shape() {
        let res = ListResponse {
            topics: vec!["a".into()],
        };
        assert_eq!(serde_json::to_value(res).unwrap(), json!({"Topics": ["a"]}));
    }
}
