//! Frontdesk Storage crate - SQLite persistence for sessions, messages and
//! knowledge documents.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations. The database is the source of truth for chat history;
//! the gateway never broadcasts anything that has not been written here.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{KnowledgeRepository, MessageRepository, SessionRepository, StatusChange};
