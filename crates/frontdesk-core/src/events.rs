use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ChatMessage, SenderKind, SessionStatus};

/// Events pushed from the gateway to connected clients.
///
/// Serialized as `{"event": "<name>", "data": {...}}` so every transport
/// frame carries its own discriminator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A persisted message in a session the connection has joined.
    #[serde(rename = "message")]
    Message(ChatMessage),

    /// Typing indicator from the other party (or the automated responder).
    #[serde(rename = "typing")]
    Typing(TypingPayload),

    /// Activity ping for the agent room: a visitor wrote into some session.
    #[serde(rename = "agent:new_message")]
    AgentNewMessage(ActivityPayload),

    /// Sent to a visitor connection after it is attached to a session.
    #[serde(rename = "session:joined")]
    SessionJoined(SessionStatusPayload),

    /// A session changed status (activated or closed).
    #[serde(rename = "session:updated")]
    SessionUpdated(SessionStatusPayload),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub session_id: Uuid,
    pub is_typing: bool,
    pub sender: SenderKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    pub session_id: Uuid,
    pub message: ChatMessage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusPayload {
    pub session_id: Uuid,
    pub status: SessionStatus,
}

impl ServerEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
            ServerEvent::Typing(_) => "typing",
            ServerEvent::AgentNewMessage(_) => "agent:new_message",
            ServerEvent::SessionJoined(_) => "session:joined",
            ServerEvent::SessionUpdated(_) => "session:updated",
        }
    }

    pub fn typing(session_id: Uuid, is_typing: bool, sender: SenderKind) -> Self {
        ServerEvent::Typing(TypingPayload {
            session_id,
            is_typing,
            sender,
        })
    }
}
