//! Repository implementations for SQLite-backed persistence.
//!
//! Provides SessionRepository, MessageRepository, and KnowledgeRepository
//! that operate on the Database struct using raw SQL. Every write is a
//! single closure under the connection lock, so per-row updates are atomic.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use frontdesk_core::error::FrontdeskError;
use frontdesk_core::lifecycle::LifecycleEvent;
use frontdesk_core::types::{
    ChatMessage, ChatSession, KnowledgeDocument, NewKnowledgeDocument, NewMessage, NewSession,
    SenderKind, SessionMetadata, SessionStatus, SessionSummary,
};

use crate::db::{storage_error, Database};

const SESSION_COLUMNS: &str = "id, visitor_name, visitor_contact, status, metadata, \
     assigned_agent, created_at, last_activity";

const MESSAGE_COLUMNS: &str =
    "id, session_id, sender_kind, sender_id, content, metadata, is_read, created_at";

const KNOWLEDGE_COLUMNS: &str = "id, title, content, tags, source_file, created_at";

/// The result of applying a lifecycle event to a stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Repository for chat sessions and their lifecycle.
pub struct SessionRepository {
    db: Arc<Database>,
}

impl SessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open a new session in the `open` state.
    pub fn create(&self, new: &NewSession) -> Result<ChatSession, FrontdeskError> {
        let now = from_millis(now_millis());
        let session = ChatSession {
            id: Uuid::new_v4(),
            visitor_name: new.visitor_name.clone(),
            visitor_contact: new.visitor_contact.clone(),
            status: SessionStatus::Open,
            metadata: new.metadata.clone(),
            assigned_agent: None,
            created_at: now,
            last_activity: now,
        };
        let metadata = serde_json::to_string(&session.metadata)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, visitor_name, visitor_contact, status, metadata, created_at, last_activity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    session.id.to_string(),
                    session.visitor_name,
                    session.visitor_contact,
                    session.status.as_str(),
                    metadata,
                    session.created_at.timestamp_millis(),
                    session.last_activity.timestamp_millis(),
                ],
            )
            .map_err(|e| FrontdeskError::Storage(format!("Failed to create session: {}", e)))?;
            Ok(())
        })?;

        Ok(session)
    }

    /// Find a session by ID.
    pub fn get(&self, id: Uuid) -> Result<Option<ChatSession>, FrontdeskError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM chat_sessions WHERE id = ?1", SESSION_COLUMNS),
                rusqlite::params![id.to_string()],
                row_to_session,
            )
            .optional()
            .map_err(|e| FrontdeskError::Storage(e.to_string()))
        })
    }

    /// List sessions, most recently active first, optionally by status.
    pub fn list(
        &self,
        status: Option<SessionStatus>,
        limit: u64,
    ) -> Result<Vec<SessionSummary>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.id, s.visitor_name, s.visitor_contact, s.status, s.metadata,
                            s.assigned_agent, s.created_at, s.last_activity,
                            (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id),
                            (SELECT COUNT(*) FROM chat_messages m
                              WHERE m.session_id = s.id AND m.sender_kind = 'visitor' AND m.is_read = 0)
                     FROM chat_sessions s
                     WHERE (?1 IS NULL OR s.status = ?1)
                     ORDER BY s.last_activity DESC, s.rowid DESC
                     LIMIT ?2",
                )
                .map_err(|e| FrontdeskError::Storage(format!("Session list prepare: {}", e)))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![status.map(|s| s.as_str()), limit as i64],
                    |row| {
                        Ok(SessionSummary {
                            session: row_to_session(row)?,
                            message_count: row.get::<_, i64>(8)? as u64,
                            unread_count: row.get::<_, i64>(9)? as u64,
                        })
                    },
                )
                .map_err(|e| FrontdeskError::Storage(format!("Session list: {}", e)))?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|e| FrontdeskError::Storage(e.to_string()))?);
            }
            Ok(sessions)
        })
    }

    /// Refresh last-activity. Never moves the timestamp backwards.
    pub fn touch(&self, id: Uuid) -> Result<(), FrontdeskError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE chat_sessions SET last_activity = MAX(last_activity, ?2) WHERE id = ?1",
                    rusqlite::params![id.to_string(), now_millis()],
                )
                .map_err(storage_error("Failed to touch session"))?;
            if changed == 0 {
                return Err(FrontdeskError::SessionNotFound(id));
            }
            Ok(())
        })
    }

    /// Record the agent attending a session and refresh last-activity.
    pub fn assign_agent(&self, id: Uuid, agent_id: &str) -> Result<(), FrontdeskError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE chat_sessions
                     SET assigned_agent = ?2, last_activity = MAX(last_activity, ?3)
                     WHERE id = ?1",
                    rusqlite::params![id.to_string(), agent_id, now_millis()],
                )
                .map_err(|e| FrontdeskError::Storage(format!("Failed to assign agent: {}", e)))?;
            if changed == 0 {
                return Err(FrontdeskError::SessionNotFound(id));
            }
            Ok(())
        })
    }

    /// Apply a lifecycle event and persist the resulting status.
    ///
    /// Read, validation and write happen under one lock acquisition, so two
    /// concurrent events cannot interleave.
    pub fn apply_event(
        &self,
        id: Uuid,
        event: LifecycleEvent,
    ) -> Result<StatusChange, FrontdeskError> {
        self.db.with_conn(|conn| {
            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM chat_sessions WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| FrontdeskError::Storage(e.to_string()))?;

            let from = match current {
                Some(s) => SessionStatus::from_str(&s)?,
                None => return Err(FrontdeskError::SessionNotFound(id)),
            };
            let to = from.apply(event)?;

            conn.execute(
                "UPDATE chat_sessions SET status = ?2, last_activity = MAX(last_activity, ?3)
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), to.as_str(), now_millis()],
            )
            .map_err(|e| FrontdeskError::Storage(format!("Failed to update status: {}", e)))?;

            Ok(StatusChange { from, to })
        })
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Repository for the ordered messages of each session.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to its session.
    ///
    /// The creation timestamp is clamped to be no earlier than the latest
    /// message already in the session, and the session's last-activity is
    /// advanced in the same transaction.
    pub fn append(&self, new: &NewMessage) -> Result<ChatMessage, FrontdeskError> {
        if new.content.trim().is_empty() {
            return Err(FrontdeskError::Validation(
                "message content must not be empty".to_string(),
            ));
        }
        let id = Uuid::new_v4();
        let metadata = new
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let created_ms = self.db.with_tx(|tx| {
            let latest: Option<i64> = tx
                .query_row(
                    "SELECT MAX(created_at) FROM chat_messages WHERE session_id = ?1",
                    rusqlite::params![new.session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| FrontdeskError::Storage(e.to_string()))?;
            let created_ms = latest.map_or(now_millis(), |l| l.max(now_millis()));

            let touched = tx
                .execute(
                    "UPDATE chat_sessions SET last_activity = MAX(last_activity, ?2) WHERE id = ?1",
                    rusqlite::params![new.session_id.to_string(), created_ms],
                )
                .map_err(storage_error("Failed to touch session"))?;
            if touched == 0 {
                return Err(FrontdeskError::SessionNotFound(new.session_id));
            }

            tx.execute(
                "INSERT INTO chat_messages (id, session_id, sender_kind, sender_id, content, metadata, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                rusqlite::params![
                    id.to_string(),
                    new.session_id.to_string(),
                    new.sender_kind.as_str(),
                    new.sender_id,
                    new.content,
                    metadata,
                    created_ms,
                ],
            )
            .map_err(storage_error("Failed to save message"))?;
            Ok(created_ms)
        })?;

        Ok(ChatMessage {
            id,
            session_id: new.session_id,
            sender_kind: new.sender_kind,
            sender_id: new.sender_id.clone(),
            content: new.content.clone(),
            metadata: new.metadata.clone(),
            read: false,
            created_at: from_millis(created_ms),
        })
    }

    /// Full history of a session in creation order.
    pub fn history(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, FrontdeskError> {
        self.query_messages(
            &format!(
                "SELECT {} FROM chat_messages WHERE session_id = ?1
                 ORDER BY created_at ASC, seq ASC",
                MESSAGE_COLUMNS
            ),
            rusqlite::params![session_id.to_string()],
        )
    }

    /// The last `limit` messages of a session, oldest first.
    pub fn recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, FrontdeskError> {
        self.query_messages(
            &format!(
                "SELECT {cols} FROM (
                     SELECT {cols}, seq FROM chat_messages WHERE session_id = ?1
                     ORDER BY created_at DESC, seq DESC
                     LIMIT ?2
                 ) ORDER BY created_at ASC, seq ASC",
                cols = MESSAGE_COLUMNS
            ),
            rusqlite::params![session_id.to_string(), limit as i64],
        )
    }

    /// Mark unread messages from `sender_kind` as read. Returns the count.
    pub fn mark_read(&self, session_id: Uuid, sender_kind: SenderKind) -> Result<usize, FrontdeskError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_messages SET is_read = 1
                 WHERE session_id = ?1 AND sender_kind = ?2 AND is_read = 0",
                rusqlite::params![session_id.to_string(), sender_kind.as_str()],
            )
            .map_err(|e| FrontdeskError::Storage(format!("Failed to mark read: {}", e)))
        })
    }

    /// Count messages in a session.
    pub fn count(&self, session_id: Uuid) -> Result<u64, FrontdeskError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
                    rusqlite::params![session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| FrontdeskError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    fn query_messages(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ChatMessage>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| FrontdeskError::Storage(format!("Message query prepare: {}", e)))?;
            let rows = stmt
                .query_map(params, row_to_message)
                .map_err(|e| FrontdeskError::Storage(format!("Message query: {}", e)))?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|e| FrontdeskError::Storage(e.to_string()))?);
            }
            Ok(messages)
        })
    }
}

// =============================================================================
// Knowledge
// =============================================================================

/// Repository for grounding documents.
pub struct KnowledgeRepository {
    db: Arc<Database>,
}

impl KnowledgeRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new knowledge document.
    pub fn create(&self, new: &NewKnowledgeDocument) -> Result<KnowledgeDocument, FrontdeskError> {
        if new.title.trim().is_empty() {
            return Err(FrontdeskError::Validation("title must not be empty".to_string()));
        }
        if new.content.trim().is_empty() {
            return Err(FrontdeskError::Validation("content must not be empty".to_string()));
        }

        let doc = KnowledgeDocument {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            content: new.content.clone(),
            tags: new.tags.clone(),
            source_file: new.source_file.clone(),
            created_at: from_millis(now_millis()),
        };
        let tags = serde_json::to_string(&doc.tags)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge_documents (id, title, content, tags, source_file, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    doc.id.to_string(),
                    doc.title,
                    doc.content,
                    tags,
                    doc.source_file,
                    doc.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| FrontdeskError::Storage(format!("Failed to save document: {}", e)))?;
            Ok(())
        })?;

        Ok(doc)
    }

    /// All documents in insertion order.
    pub fn list(&self) -> Result<Vec<KnowledgeDocument>, FrontdeskError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM knowledge_documents ORDER BY seq ASC",
                    KNOWLEDGE_COLUMNS
                ))
                .map_err(|e| FrontdeskError::Storage(format!("Knowledge list prepare: {}", e)))?;
            let rows = stmt
                .query_map([], row_to_document)
                .map_err(|e| FrontdeskError::Storage(format!("Knowledge list: {}", e)))?;

            let mut docs = Vec::new();
            for row in rows {
                docs.push(row.map_err(|e| FrontdeskError::Storage(e.to_string()))?);
            }
            Ok(docs)
        })
    }

    /// Find a document by ID.
    pub fn get(&self, id: Uuid) -> Result<Option<KnowledgeDocument>, FrontdeskError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM knowledge_documents WHERE id = ?1", KNOWLEDGE_COLUMNS),
                rusqlite::params![id.to_string()],
                row_to_document,
            )
            .optional()
            .map_err(|e| FrontdeskError::Storage(e.to_string()))
        })
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<ChatSession> {
    let status: String = row.get(3)?;
    let metadata: String = row.get(4)?;
    Ok(ChatSession {
        id: uuid_column(row, 0)?,
        visitor_name: row.get(1)?,
        visitor_contact: row.get(2)?,
        status: SessionStatus::from_str(&status).map_err(|e| conversion_error(3, e))?,
        metadata: serde_json::from_str::<SessionMetadata>(&metadata)
            .map_err(|e| conversion_error(4, e))?,
        assigned_agent: row.get(5)?,
        created_at: from_millis(row.get(6)?),
        last_activity: from_millis(row.get(7)?),
    })
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let kind: String = row.get(2)?;
    let metadata: Option<String> = row.get(5)?;
    Ok(ChatMessage {
        id: uuid_column(row, 0)?,
        session_id: uuid_column(row, 1)?,
        sender_kind: SenderKind::from_str(&kind).map_err(|e| conversion_error(2, e))?,
        sender_id: row.get(3)?,
        content: row.get(4)?,
        metadata: metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| conversion_error(5, e))?,
        read: row.get::<_, i64>(6)? != 0,
        created_at: from_millis(row.get(7)?),
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<KnowledgeDocument> {
    let tags: String = row.get(3)?;
    Ok(KnowledgeDocument {
        id: uuid_column(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_error(3, e))?,
        source_file: row.get(4)?,
        created_at: from_millis(row.get(5)?),
    })
}
