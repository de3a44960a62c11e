//! Application state shared across all route handlers.
//!
//! AppState holds references to the database, the gateway and the staff
//! credential verifier. It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use frontdesk_chat::AutomatedResponder;
use frontdesk_core::auth::CredentialVerifier;
use frontdesk_core::config::FrontdeskConfig;
use frontdesk_gateway::Gateway;
use frontdesk_storage::{Database, KnowledgeRepository, MessageRepository, SessionRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<FrontdeskConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// Real-time gateway shared with every socket.
    pub gateway: Arc<Gateway>,
    /// Resolves staff bearer tokens to agents.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState, wiring the gateway to the database.
    pub fn new(
        config: FrontdeskConfig,
        database: Arc<Database>,
        verifier: Arc<dyn CredentialVerifier>,
        responder: Option<Arc<AutomatedResponder>>,
    ) -> Self {
        let gateway = Gateway::new(
            Arc::clone(&database),
            Arc::clone(&verifier),
            responder,
            config.gateway.clone(),
        );
        Self {
            config: Arc::new(config),
            database,
            gateway,
            verifier,
            start_time: Instant::now(),
        }
    }

    pub fn sessions(&self) -> SessionRepository {
        SessionRepository::new(Arc::clone(&self.database))
    }

    pub fn messages(&self) -> MessageRepository {
        MessageRepository::new(Arc::clone(&self.database))
    }

    pub fn knowledge(&self) -> KnowledgeRepository {
        KnowledgeRepository::new(Arc::clone(&self.database))
    }
}
