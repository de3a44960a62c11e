//! SQLite handle shared by the repositories.
//!
//! One connection behind a `Mutex`. File databases run in WAL mode with a
//! busy timeout; both file and in-memory databases enforce foreign keys, which
//! the message table relies on for cascade deletes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::info;

use frontdesk_core::error::FrontdeskError;

use crate::migrations;

const FILE_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;";

const MEMORY_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Map a rusqlite error into a storage error with a short context prefix.
pub(crate) fn storage_error(context: &'static str) -> impl Fn(rusqlite::Error) -> FrontdeskError {
    move |e| FrontdeskError::Storage(format!("{}: {}", context, e))
}

/// The chat store's connection.
///
/// Every statement runs while the mutex is held, so each closure passed to
/// [`Database::with_conn`] or [`Database::with_tx`] is atomic with respect to
/// other writers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the chat store at `path` and bring its schema up to date.
    pub fn new(path: &Path) -> Result<Self, FrontdeskError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage_error("Failed to open database"))?;
        let db = Self::prepare(conn, FILE_PRAGMAS)?;
        info!(path = %path.display(), version = db.schema_version()?, "Chat store ready");
        Ok(db)
    }

    /// A throwaway store for tests and ephemeral runs.
    pub fn in_memory() -> Result<Self, FrontdeskError> {
        let conn =
            Connection::open_in_memory().map_err(storage_error("Failed to open in-memory db"))?;
        Self::prepare(conn, MEMORY_PRAGMAS)
    }

    fn prepare(conn: Connection, pragmas: &str) -> Result<Self, FrontdeskError> {
        conn.execute_batch(pragmas)
            .map_err(storage_error("Failed to set pragmas"))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` with the connection held.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, FrontdeskError>
    where
        F: FnOnce(&Connection) -> Result<T, FrontdeskError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FrontdeskError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, FrontdeskError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, FrontdeskError>,
    {
        self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(storage_error("Failed to begin transaction"))?;
            let value = f(&tx)?;
            tx.commit().map_err(storage_error("Failed to commit"))?;
            Ok(value)
        })
    }

    /// Highest applied migration.
    pub fn schema_version(&self) -> Result<i64, FrontdeskError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .map_err(storage_error("Failed to read schema version"))
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
