//! Client-to-server events.
//!
//! Same envelope as [`frontdesk_core::ServerEvent`]:
//! `{"event": "<name>", "data": {...}}` with camelCase fields.

use serde::Deserialize;
use uuid::Uuid;

use frontdesk_core::types::Role;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(JoinPayload),

    #[serde(rename = "client:message")]
    ClientMessage(MessagePayload),

    #[serde(rename = "agent:message")]
    AgentMessage(AgentMessagePayload),

    #[serde(rename = "typing")]
    Typing(ClientTypingPayload),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub role: Role,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub credential: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub session_id: Uuid,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessagePayload {
    pub session_id: Uuid,
    pub content: String,
    pub credential: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTypingPayload {
    pub session_id: Uuid,
    pub is_typing: bool,
}

impl ClientEvent {
    /// Parse one text frame. Malformed frames yield `None`.
    pub fn parse(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::ClientMessage(_) => "client:message",
            ClientEvent::AgentMessage(_) => "agent:message",
            ClientEvent::Typing(_) => "typing",
        }
    }
}
