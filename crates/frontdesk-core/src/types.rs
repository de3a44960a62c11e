use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FrontdeskError;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of a chat session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created on first contact, no agent has replied yet.
    #[default]
    Open,
    /// At least one agent message has been sent into the session.
    Active,
    /// Terminal. Closed by an explicit staff action.
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = FrontdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SessionStatus::Open),
            "active" => Ok(SessionStatus::Active),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(FrontdeskError::Validation(format!(
                "unknown session status: {}",
                other
            ))),
        }
    }
}

/// Who authored a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderKind {
    Visitor,
    Agent,
    Automated,
    System,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Visitor => "visitor",
            SenderKind::Agent => "agent",
            SenderKind::Automated => "automated",
            SenderKind::System => "system",
        }
    }

    /// Speaker label used when a conversation is rendered as a transcript.
    pub fn transcript_label(&self) -> &'static str {
        match self {
            SenderKind::Visitor => "Visitor",
            SenderKind::Agent => "Agent",
            SenderKind::Automated => "Assistant",
            SenderKind::System => "System",
        }
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SenderKind {
    type Err = FrontdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(SenderKind::Visitor),
            "agent" => Ok(SenderKind::Agent),
            "automated" => Ok(SenderKind::Automated),
            "system" => Ok(SenderKind::System),
            other => Err(FrontdeskError::Validation(format!(
                "unknown sender kind: {}",
                other
            ))),
        }
    }
}

/// Role a live connection joined the gateway with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Visitor,
    Agent,
}

impl Role {
    /// The sender kind events from this role carry.
    pub fn sender_kind(&self) -> SenderKind {
        match self {
            Role::Visitor => SenderKind::Visitor,
            Role::Agent => SenderKind::Agent,
        }
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Free-form metadata captured when a session is opened.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Any additional client-supplied keys.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A persisted chat session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub visitor_name: Option<String>,
    pub visitor_contact: Option<String>,
    pub status: SessionStatus,
    pub metadata: SessionMetadata,
    pub assigned_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Fields supplied when opening a new session.
#[derive(Clone, Debug, Default)]
pub struct NewSession {
    pub visitor_name: Option<String>,
    pub visitor_contact: Option<String>,
    pub metadata: SessionMetadata,
}

/// A session row with counters for the staff session list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: ChatSession,
    pub message_count: u64,
    pub unread_count: u64,
}

// =============================================================================
// Messages
// =============================================================================

/// A persisted chat message. Immutable apart from `read`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_kind: SenderKind,
    pub sender_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A message about to be appended to a session.
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub sender_kind: SenderKind,
    pub sender_id: Option<String>,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewMessage {
    pub fn visitor(session_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            session_id,
            sender_kind: SenderKind::Visitor,
            sender_id: None,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn agent(session_id: Uuid, agent_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id,
            sender_kind: SenderKind::Agent,
            sender_id: Some(agent_id.into()),
            content: content.into(),
            metadata: None,
        }
    }

    pub fn automated(
        session_id: Uuid,
        content: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            session_id,
            sender_kind: SenderKind::Automated,
            sender_id: None,
            content: content.into(),
            metadata,
        }
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// A grounding document for automated replies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDocument {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when authoring a knowledge document.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKnowledgeDocument {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub source_file: Option<String>,
}
