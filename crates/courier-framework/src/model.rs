//! Update payloads as delivered by the bot API.
//!
//! Only the fields the client itself needs are typed. Everything else is
//! kept in the flattened `extra` map of each struct, so handlers can still
//! reach media, entities and whatever the API adds later.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A private chat, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub date: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Returns the raw value of a top-level field, typed or not.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "message_id" => Some(Value::from(self.message_id)),
            "date" => Some(Value::from(self.date)),
            "text" => self.text.clone().map(Value::String),
            "chat" => serde_json::to_value(&self.chat).ok(),
            "from" => self.from.as_ref().and_then(|u| serde_json::to_value(u).ok()),
            _ => self.extra.get(name).cloned(),
        }
    }

    /// Returns `true` if `name` is present and holds a truthy value.
    ///
    /// `null`, `false`, `0` and the empty string count as absent.
    pub fn has_field(&self, name: &str) -> bool {
        match name {
            "text" => self.text.as_deref().is_some_and(|t| !t.is_empty()),
            _ => self.extra.get(name).is_some_and(is_truthy),
        }
    }
}

/// One incoming update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Update {
    /// Returns `true` if the update carries a non-empty inline query.
    pub fn has_inline_query(&self) -> bool {
        self.inline_query.as_ref().is_some_and(is_truthy)
    }
}

/// A file ready for download, as returned by `getFile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    /// Pass to [`Bot::file_url`](crate::bot::Bot::file_url) to build a download link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Scripting-style truthiness for loosely typed payload fields.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
