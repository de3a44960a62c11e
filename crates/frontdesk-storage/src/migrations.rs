//! Database schema migrations.
//!
//! Applies the initial schema: chat_sessions, chat_messages,
//! knowledge_documents and the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use frontdesk_core::error::FrontdeskError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), FrontdeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| FrontdeskError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| FrontdeskError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: chat_schema");
    }

    Ok(())
}

/// Version 1: sessions, messages, knowledge.
///
/// Timestamps are epoch milliseconds. `chat_messages.seq` breaks ties
/// between messages written in the same millisecond.
fn apply_v1(conn: &Connection) -> Result<(), FrontdeskError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id              TEXT PRIMARY KEY NOT NULL,
            visitor_name    TEXT,
            visitor_contact TEXT,
            status          TEXT NOT NULL DEFAULT 'open'
                            CHECK (status IN ('open', 'active', 'closed')),
            metadata        TEXT NOT NULL DEFAULT '{}',
            assigned_agent  TEXT,
            created_at      INTEGER NOT NULL,
            last_activity   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_status
            ON chat_sessions (status, last_activity DESC);

        CREATE INDEX IF NOT EXISTS idx_chat_sessions_last_activity
            ON chat_sessions (last_activity DESC);

        CREATE TABLE IF NOT EXISTS chat_messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            session_id      TEXT NOT NULL,
            sender_kind     TEXT NOT NULL
                            CHECK (sender_kind IN ('visitor', 'agent', 'automated', 'system')),
            sender_id       TEXT,
            content         TEXT NOT NULL CHECK (length(content) > 0),
            metadata        TEXT,
            is_read         INTEGER NOT NULL DEFAULT 0,
            created_at      INTEGER NOT NULL,
            FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_session
            ON chat_messages (session_id, created_at ASC, seq ASC);

        CREATE INDEX IF NOT EXISTS idx_chat_messages_unread
            ON chat_messages (session_id, sender_kind)
            WHERE is_read = 0;

        CREATE TABLE IF NOT EXISTS knowledge_documents (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            title           TEXT NOT NULL,
            content         TEXT NOT NULL,
            tags            TEXT NOT NULL DEFAULT '[]',
            source_file     TEXT,
            created_at      INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'chat_schema');
        ",
    )
    .map_err(|e| FrontdeskError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
