//! The gateway: joins, message fan-out, typing relay and session closing.
//!
//! Every write to a session goes through the same sequence under that
//! session's lock: validate, persist, broadcast. Nothing is broadcast that
//! did not persist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use frontdesk_chat::responder::{AutomatedResponder, Turn, TurnSink};
use frontdesk_core::auth::{AgentIdentity, CredentialVerifier};
use frontdesk_core::config::GatewayConfig;
use frontdesk_core::error::FrontdeskError;
use frontdesk_core::events::{ActivityPayload, ServerEvent, SessionStatusPayload};
use frontdesk_core::lifecycle::LifecycleEvent;
use frontdesk_core::types::{
    ChatMessage, ChatSession, NewMessage, NewSession, Role, SenderKind, SessionMetadata,
    SessionStatus,
};
use frontdesk_storage::{Database, MessageRepository, SessionRepository, StatusChange};

use crate::error::GatewayError;
use crate::protocol::ClientEvent;
use crate::rooms::{ConnectionId, RoomKey, RoomTable};
use crate::sequencer::SessionLocks;

/// Request details captured when a connection is opened.
#[derive(Clone, Debug, Default)]
pub struct ConnectMetadata {
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

/// What a successful join attached the connection to.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinOutcome {
    Visitor {
        session: ChatSession,
        created: bool,
    },
    Agent {
        agent: AgentIdentity,
        session_id: Option<Uuid>,
    },
}

pub struct Gateway {
    rooms: RoomTable,
    locks: SessionLocks,
    sessions: SessionRepository,
    messages: MessageRepository,
    verifier: Arc<dyn CredentialVerifier>,
    responder: Option<Arc<AutomatedResponder>>,
    config: GatewayConfig,
    connect_metadata: Mutex<HashMap<ConnectionId, ConnectMetadata>>,
    this: Weak<Gateway>,
}

impl Gateway {
    pub fn new(
        db: Arc<Database>,
        verifier: Arc<dyn CredentialVerifier>,
        responder: Option<Arc<AutomatedResponder>>,
        config: GatewayConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            rooms: RoomTable::new(config.outbound_queue_capacity),
            locks: SessionLocks::new(),
            sessions: SessionRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(db),
            verifier,
            responder,
            config,
            connect_metadata: Mutex::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }

    pub fn connection_count(&self) -> usize {
        self.rooms.connection_count()
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Register a live connection.
    pub fn connect(&self, metadata: ConnectMetadata) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (conn, rx) = self.rooms.register();
        self.connect_metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conn, metadata);
        debug!(connection = %conn, "Connection registered");
        (conn, rx)
    }

    /// Remove a connection from every room. Sessions are left untouched.
    pub fn disconnect(&self, conn: ConnectionId) {
        self.rooms.remove(conn);
        self.connect_metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn);
        debug!(connection = %conn, "Connection removed");
    }

    /// Parse and dispatch one inbound text frame.
    pub async fn handle_frame(&self, conn: ConnectionId, frame: &str) {
        match ClientEvent::parse(frame) {
            Some(event) => self.handle_event(conn, event).await,
            None => debug!(connection = %conn, "Dropping malformed frame"),
        }
    }

    /// Dispatch one inbound event. Failures are logged, never answered.
    pub async fn handle_event(&self, conn: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let result = match event {
            ClientEvent::Join(p) => self
                .join(conn, p.role, p.session_id, p.credential.as_deref())
                .await
                .map(|_| ()),
            ClientEvent::ClientMessage(p) => self
                .visitor_message(p.session_id, &p.content)
                .await
                .map(|_| ()),
            ClientEvent::AgentMessage(p) => self
                .agent_message(p.session_id, &p.content, &p.credential)
                .await
                .map(|_| ()),
            ClientEvent::Typing(p) => self.typing(conn, p.session_id, p.is_typing).map(|_| ()),
        };

        match result {
            Ok(()) => {}
            Err(GatewayError::Storage(e)) => {
                warn!(connection = %conn, event = name, error = %e, "Event failed on storage");
            }
            Err(e) => {
                debug!(connection = %conn, event = name, reason = %e, "Event dropped");
            }
        }
    }

    // =========================================================================
    // Joins
    // =========================================================================

    /// Attach a connection to the rooms its role and identifier allow.
    pub async fn join(
        &self,
        conn: ConnectionId,
        role: Role,
        session_id: Option<Uuid>,
        credential: Option<&str>,
    ) -> Result<JoinOutcome, GatewayError> {
        match role {
            Role::Visitor => self.join_visitor(conn, session_id),
            Role::Agent => self.join_agent(conn, session_id, credential).await,
        }
    }

    fn join_visitor(
        &self,
        conn: ConnectionId,
        session_id: Option<Uuid>,
    ) -> Result<JoinOutcome, GatewayError> {
        let existing = match session_id {
            Some(id) => self.sessions.get(id)?.filter(|s| !s.status.is_closed()),
            None => None,
        };

        let (session, created) = match existing {
            Some(session) => {
                self.sessions.touch(session.id)?;
                (session, false)
            }
            None => {
                let meta = self
                    .connect_metadata
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&conn)
                    .cloned()
                    .unwrap_or_default();
                let session = self.sessions.create(&NewSession {
                    metadata: SessionMetadata {
                        origin: meta.origin,
                        user_agent: meta.user_agent,
                        ..Default::default()
                    },
                    ..Default::default()
                })?;
                info!(session_id = %session.id, connection = %conn, "Session opened");
                (session, true)
            }
        };

        let previous = self.rooms.role(conn);
        if !self.rooms.set_role(conn, Role::Visitor) {
            return Err(GatewayError::NotJoined);
        }
        if previous == Some(Role::Agent) {
            self.rooms.leave(conn, RoomKey::Agents);
        }
        self.rooms.join_session(conn, session.id);
        self.rooms.send_to(conn, joined_event(session.id, session.status));

        Ok(JoinOutcome::Visitor { session, created })
    }

    async fn join_agent(
        &self,
        conn: ConnectionId,
        session_id: Option<Uuid>,
        credential: Option<&str>,
    ) -> Result<JoinOutcome, GatewayError> {
        let agent = self.verify(credential.unwrap_or_default()).await?;

        let previous = self.rooms.role(conn);
        if !self.rooms.set_role(conn, Role::Agent) {
            return Err(GatewayError::NotJoined);
        }
        if previous == Some(Role::Visitor) {
            self.rooms.leave_sessions(conn);
        }
        self.rooms.join(conn, RoomKey::Agents);

        let mut joined_session = None;
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.get(id)? {
                if !session.status.is_closed() {
                    self.sessions.assign_agent(id, &agent.agent_id)?;
                }
                self.rooms.join_session(conn, id);
                self.rooms.send_to(conn, joined_event(id, session.status));
                joined_session = Some(id);
            }
        }

        info!(agent_id = %agent.agent_id, connection = %conn, "Agent joined");
        Ok(JoinOutcome::Agent {
            agent,
            session_id: joined_session,
        })
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Persist a visitor message, fan it out, and start an automated turn.
    pub async fn visitor_message(
        &self,
        session_id: Uuid,
        content: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let content = self.validate_content(content)?;

        let message = {
            let _guard = self.locks.lock(session_id).await;
            self.require_open(session_id)?;
            let message = self
                .messages
                .append(&NewMessage::visitor(session_id, content))?;

            self.rooms
                .broadcast(RoomKey::Session(session_id), &ServerEvent::Message(message.clone()));
            self.rooms.broadcast(
                RoomKey::Agents,
                &ServerEvent::AgentNewMessage(ActivityPayload {
                    session_id,
                    message: message.clone(),
                }),
            );
            message
        };

        self.start_turn(&message);
        Ok(message)
    }

    /// Persist an agent message and activate the session on first reply.
    pub async fn agent_message(
        &self,
        session_id: Uuid,
        content: &str,
        credential: &str,
    ) -> Result<ChatMessage, GatewayError> {
        let agent = self.verify(credential).await?;
        let content = self.validate_content(content)?;

        let _guard = self.locks.lock(session_id).await;
        self.require_open(session_id)?;
        let message = self
            .messages
            .append(&NewMessage::agent(session_id, &agent.agent_id, content))?;

        let change = match self.sessions.apply_event(session_id, LifecycleEvent::AgentMessage) {
            Ok(change) => Some(change),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to activate session");
                None
            }
        };

        self.rooms
            .broadcast(RoomKey::Session(session_id), &ServerEvent::Message(message.clone()));

        if let Some(change) = change.filter(StatusChange::changed) {
            info!(session_id = %session_id, agent_id = %agent.agent_id, "Session activated");
            self.rooms
                .broadcast(RoomKey::Agents, &updated_event(session_id, change.to));
        }
        Ok(message)
    }

    /// Relay a typing indicator to the other party in a session.
    ///
    /// Visitors may only signal into the session room they are in.
    pub fn typing(
        &self,
        conn: ConnectionId,
        session_id: Uuid,
        is_typing: bool,
    ) -> Result<usize, GatewayError> {
        let role = self.rooms.role(conn).ok_or(GatewayError::NotJoined)?;
        if role == Role::Visitor && !self.rooms.contains(conn, RoomKey::Session(session_id)) {
            return Err(GatewayError::NotJoined);
        }
        let event = ServerEvent::typing(session_id, is_typing, role.sender_kind());
        Ok(self.rooms.broadcast_filtered(
            RoomKey::Session(session_id),
            &event,
            |member, member_role| member != conn && member_role != Some(role),
        ))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close a session and announce it to the session and agent rooms.
    pub async fn close_session(&self, session_id: Uuid) -> Result<StatusChange, GatewayError> {
        let _guard = self.locks.lock(session_id).await;
        let change = self
            .sessions
            .apply_event(session_id, LifecycleEvent::Close)
            .map_err(|e| match e {
                FrontdeskError::InvalidTransition { .. } => GatewayError::SessionClosed(session_id),
                other => GatewayError::from(other),
            })?;

        let event = updated_event(session_id, change.to);
        self.rooms.broadcast(RoomKey::Session(session_id), &event);
        self.rooms.broadcast(RoomKey::Agents, &event);
        info!(session_id = %session_id, from = %change.from, "Session closed");
        Ok(change)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn verify(&self, credential: &str) -> Result<AgentIdentity, GatewayError> {
        self.verifier
            .verify(credential)
            .await
            .ok_or(GatewayError::Unauthorized)
    }

    fn validate_content<'a>(&self, content: &'a str) -> Result<&'a str, GatewayError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(GatewayError::InvalidPayload("empty message".to_string()));
        }
        let chars = trimmed.chars().count();
        if chars > self.config.max_message_chars {
            return Err(GatewayError::InvalidPayload(format!(
                "message has {} characters, limit is {}",
                chars, self.config.max_message_chars
            )));
        }
        Ok(trimmed)
    }

    fn require_open(&self, session_id: Uuid) -> Result<ChatSession, GatewayError> {
        let session = self
            .sessions
            .get(session_id)?
            .ok_or(GatewayError::SessionNotFound(session_id))?;
        if session.status.is_closed() {
            return Err(GatewayError::SessionClosed(session_id));
        }
        Ok(session)
    }

    fn start_turn(&self, message: &ChatMessage) {
        let Some(responder) = self.responder.as_ref().filter(|r| r.is_enabled()) else {
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let sink: Arc<dyn TurnSink> = this;
        Arc::clone(responder).spawn_turn(sink, Turn::from_message(message));
    }
}

#[async_trait]
impl TurnSink for Gateway {
    async fn typing(&self, session_id: Uuid, is_typing: bool) {
        self.rooms.broadcast(
            RoomKey::Session(session_id),
            &ServerEvent::typing(session_id, is_typing, SenderKind::Automated),
        );
    }

    async fn commit(&self, message: NewMessage) -> Result<ChatMessage, FrontdeskError> {
        let session_id = message.session_id;
        let _guard = self.locks.lock(session_id).await;

        let session = self
            .sessions
            .get(session_id)?
            .ok_or(FrontdeskError::SessionNotFound(session_id))?;
        if session.status.is_closed() {
            return Err(FrontdeskError::Validation(format!(
                "session {} closed before the reply was ready",
                session_id
            )));
        }

        let saved = self.messages.append(&message)?;
        self.rooms
            .broadcast(RoomKey::Session(session_id), &ServerEvent::Message(saved.clone()));
        Ok(saved)
    }
}

fn joined_event(session_id: Uuid, status: SessionStatus) -> ServerEvent {
    ServerEvent::SessionJoined(SessionStatusPayload { session_id, status })
}

fn updated_event(session_id: Uuid, status: SessionStatus) -> ServerEvent {
    ServerEvent::SessionUpdated(SessionStatusPayload { session_id, status })
}
