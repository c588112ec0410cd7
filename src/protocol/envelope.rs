//! Wire envelope
//!
//! Requests and responses share one shape:
//!
//! ```text
//! { "Id": string, "Type": string, "Msg": <json>, "Error"?: string }
//! ```
//!
//! `Id` is a client-chosen correlation token echoed back unchanged.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message types understood by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Auth,
    Sub,
    Unsub,
    List,
    SchemaSet,
    SchemaGet,
    Inst,
    Mut,
}

impl MessageType {
    /// Parse a wire type string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auth" => Some(MessageType::Auth),
            "sub" => Some(MessageType::Sub),
            "unsub" => Some(MessageType::Unsub),
            "list" => Some(MessageType::List),
            "schema-set" => Some(MessageType::SchemaSet),
            "schema-get" => Some(MessageType::SchemaGet),
            "inst" => Some(MessageType::Inst),
            "mut" => Some(MessageType::Mut),
            _ => None,
        }
    }

    /// Wire type string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Auth => "auth",
            MessageType::Sub => "sub",
            MessageType::Unsub => "unsub",
            MessageType::List => "list",
            MessageType::SchemaSet => "schema-set",
            MessageType::SchemaGet => "schema-get",
            MessageType::Inst => "inst",
            MessageType::Mut => "mut",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request/response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation token
    #[serde(rename = "Id", alias = "id", default)]
    pub id: String,

    /// Message type
    #[serde(rename = "Type", alias = "type", default)]
    pub kind: String,

    /// Type-specific payload; `null` on error responses
    #[serde(rename = "Msg", alias = "msg", default)]
    pub msg: Value,

    /// Present only on failed responses
    #[serde(
        rename = "Error",
        alias = "error",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl Envelope {
    /// Build a request envelope
    pub fn request(id: impl Into<String>, kind: MessageType, msg: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            msg,
            error: None,
        }
    }

    /// Build a response echoing this request's id and type
    pub fn reply(&self, msg: Value) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            msg,
            error: None,
        }
    }

    /// Build an error response echoing this request's id and type
    pub fn reply_error(&self, error: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind.clone(),
            msg: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Decode an envelope from a text frame
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parsed message type, if known
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }

    /// Decode the payload into a typed message
    pub fn payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_pascal_case() {
        let env = Envelope::decode(r#"{"Id": "1", "Type": "list", "Msg": null}"#).unwrap();
        assert_eq!(env.id, "1");
        assert_eq!(env.message_type(), Some(MessageType::List));
        assert!(env.msg.is_null());
    }

    #[test]
    fn test_decode_lower_case_aliases() {
        let env = Envelope::decode(r#"{"id": "7", "type": "sub", "msg": {"id": "x"}}"#).unwrap();
        assert_eq!(env.id, "7");
        assert_eq!(env.kind, "sub");
        assert_eq!(env.msg, json!({"id": "x"}));
    }

    #[test]
    fn test_missing_msg_defaults_to_null() {
        let env = Envelope::decode(r#"{"Id": "1", "Type": "list"}"#).unwrap();
        assert!(env.msg.is_null());
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(Envelope::decode("{not json").is_err());
        assert!(Envelope::decode(r#"{"Id": 5, "Type": "list"}"#).is_err());
    }

    #[test]
    fn test_reply_echoes_id_and_type() {
        let req = Envelope::request("abc", MessageType::Inst, json!({"SchemaId": "s"}));
        let res = req.reply(json!({"ok": true}));
        assert_eq!(res.id, "abc");
        assert_eq!(res.kind, "inst");
        assert!(res.error.is_none());
    }

    #[test]
    fn test_error_reply_shape() {
        let req = Envelope::request("abc", MessageType::Inst, json!({}));
        let res = req.reply_error("unknown schema, cannot instance");

        let json: Value = serde_json::from_str(&res.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            json!({"Id": "abc", "Type": "inst", "Msg": null, "Error": "unknown schema, cannot instance"})
        );
    }

    #[test]
    fn test_success_reply_omits_error() {
        let req = Envelope::request("1", MessageType::List, Value::Null);
        let text = req.reply(json!({"Topics": []})).encode().unwrap();
        assert!(!text.contains("Error"));
    }

    #[test]
    fn test_message_type_parse() {
        for t in [
            MessageType::Auth,
            MessageType::Sub,
            MessageType::Unsub,
            MessageType::List,
            MessageType::SchemaSet,
            MessageType::SchemaGet,
            MessageType::Inst,
            MessageType::Mut,
        ] {
            assert_eq!(MessageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MessageType::parse("publish"), None);
    }
}
