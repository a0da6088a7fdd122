//! Realtime events exchanged with the chat server, independent of how they
//! are framed on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMention {
    #[serde(default, deserialize_with = "lenient_id")]
    pub message_id: Option<i64>,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub author_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAdded {
    pub message_id: i64,
    pub emoji: String,
    pub count: u32,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: i64,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTyping {
    #[serde(default, deserialize_with = "lenient_id")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub recipient_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJoined {
    #[serde(default, deserialize_with = "lenient_id")]
    pub channel_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    NewMention(NewMention),
    ReactionAdded(ReactionAdded),
    NewMessage(NewMessage),
    UserTyping(UserTyping),
    UserJoined(UserJoined),
}

impl ServerEvent {
    /// Builds a typed event from its name and JSON payload.
    pub fn from_parts(name: &str, data: Value) -> Result<Self> {
        let event = match name {
            "new_mention" => ServerEvent::NewMention(serde_json::from_value(data)?),
            "reaction_added" => ServerEvent::ReactionAdded(serde_json::from_value(data)?),
            "new_message" => ServerEvent::NewMessage(serde_json::from_value(data)?),
            "user_typing" => ServerEvent::UserTyping(serde_json::from_value(data)?),
            "user_joined" => ServerEvent::UserJoined(serde_json::from_value(data)?),
            other => return Err(Error::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMention(_) => "new_mention",
            ServerEvent::ReactionAdded(_) => "reaction_added",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::UserTyping(_) => "user_typing",
            ServerEvent::UserJoined(_) => "user_joined",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub content: String,
    pub channel_id: i64,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinChannel {
    pub channel_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typing {
    pub user_id: Option<i64>,
    pub channel_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddReaction {
    pub message_id: i64,
    pub emoji: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SendMessage(SendMessage),
    JoinChannel(JoinChannel),
    Typing(Typing),
    AddReaction(AddReaction),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::JoinChannel(_) => "join_channel",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::AddReaction(_) => "add_reaction",
        }
    }

    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            ClientEvent::SendMessage(payload) => serde_json::to_value(payload)?,
            ClientEvent::JoinChannel(payload) => serde_json::to_value(payload)?,
            ClientEvent::Typing(payload) => serde_json::to_value(payload)?,
            ClientEvent::AddReaction(payload) => serde_json::to_value(payload)?,
        };
        Ok(value)
    }
}

/// Accepts ids sent as numbers, numeric strings, or null. Browser clients
/// send ids read from the DOM as strings and the server echoes them back.
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}
