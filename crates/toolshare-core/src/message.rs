//! The `{tool, action, payload}` unit carried between instances.
//!
//! The wire form is a plain JSON object. Decoding is strict about `tool` and
//! `action` and lenient about `payload`, which defaults to `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Every tool hosted by the shell. Serialized as its lowercase name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolId {
    Rewrite,
    Ocr,
    Timer,
    Qr,
    Map,
    Imgconv,
    Memo,
    Calendar,
}

impl ToolId {
    /// Position of this tool in a `[_; ToolId::COUNT]` table.
    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message field `{0}` is missing or not a string")]
    MissingField(&'static str),
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub tool: ToolId,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(tool: ToolId, action: impl Into<String>, payload: Value) -> Self {
        Self {
            tool,
            action: action.into(),
            payload,
        }
    }

    /// Encode as the wire object `{ "tool", "action", "payload" }`.
    pub fn to_wire(&self) -> Value {
        let mut object = Map::with_capacity(3);
        object.insert("tool".to_string(), Value::String(self.tool.to_string()));
        object.insert("action".to_string(), Value::String(self.action.clone()));
        object.insert("payload".to_string(), self.payload.clone());
        Value::Object(object)
    }

    /// Decode a wire object received from another instance.
    pub fn from_wire(value: &Value) -> Result<Self, MalformedMessage> {
        let object = value.as_object().ok_or(MalformedMessage::NotAnObject)?;

        let tool = object
            .get("tool")
            .and_then(Value::as_str)
            .ok_or(MalformedMessage::MissingField("tool"))?;
        let tool = tool
            .parse::<ToolId>()
            .map_err(|_| MalformedMessage::UnknownTool(tool.to_string()))?;

        let action = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(MalformedMessage::MissingField("action"))?;

        Ok(Self {
            tool,
            action: action.to_string(),
            payload: object.get("payload").cloned().unwrap_or(Value::Null),
        })
    }
}
