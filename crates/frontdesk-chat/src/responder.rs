//! Automated responder pipeline.
//!
//! One run per visitor turn: signal typing, gather grounding and recent
//! history, ask the provider chain, commit the reply through the gateway,
//! clear typing. Runs are spawned detached so the visitor's own message is
//! never held up by a slow provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use frontdesk_core::config::ResponderConfig;
use frontdesk_core::error::FrontdeskError;
use frontdesk_core::types::{ChatMessage, NewMessage};
use frontdesk_storage::{Database, KnowledgeRepository, MessageRepository};

use crate::error::ChatError;
use crate::prompt::InstructionBundle;
use crate::provider::{ProviderChain, ProviderError};
use crate::retrieval::retrieve;

/// Gateway capability used by the pipeline to reach the session room.
#[async_trait]
pub trait TurnSink: Send + Sync {
    /// Relay an automated typing indicator to the session room.
    async fn typing(&self, session_id: Uuid, is_typing: bool);

    /// Persist and broadcast the automated reply.
    async fn commit(&self, message: NewMessage) -> Result<ChatMessage, FrontdeskError>;
}

/// The visitor utterance that triggered a run.
#[derive(Clone, Debug)]
pub struct Turn {
    pub session_id: Uuid,
    /// Id of the persisted visitor message, left out of the transcript.
    pub message_id: Uuid,
    pub utterance: String,
}

impl Turn {
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            session_id: message.session_id,
            message_id: message.id,
            utterance: message.content.clone(),
        }
    }
}

/// Tunables copied out of [`ResponderConfig`].
#[derive(Clone, Debug)]
pub struct ResponderSettings {
    pub enabled: bool,
    pub retrieval_limit: usize,
    pub history_limit: usize,
    pub preamble: String,
}

impl From<&ResponderConfig> for ResponderSettings {
    fn from(config: &ResponderConfig) -> Self {
        Self {
            enabled: config.enabled,
            retrieval_limit: config.retrieval_limit,
            history_limit: config.history_limit,
            preamble: config.preamble.clone(),
        }
    }
}

pub struct AutomatedResponder {
    settings: ResponderSettings,
    knowledge: KnowledgeRepository,
    messages: MessageRepository,
    chain: ProviderChain,
}

impl AutomatedResponder {
    pub fn new(settings: ResponderSettings, db: Arc<Database>, chain: ProviderChain) -> Self {
        Self {
            settings,
            knowledge: KnowledgeRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(db),
            chain,
        }
    }

    /// Build the responder and its provider chain from configuration.
    pub fn from_config(config: &ResponderConfig, db: Arc<Database>) -> Result<Self, ProviderError> {
        let chain = ProviderChain::from_config(config)?;
        info!(
            enabled = config.enabled,
            configured_providers = chain.configured_count(),
            "Automated responder initialized"
        );
        Ok(Self::new(ResponderSettings::from(config), db, chain))
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Run one turn to completion.
    ///
    /// Returns the committed reply, or `None` when the responder is disabled.
    /// The typing indicator is cleared on every exit path.
    pub async fn run_turn(
        &self,
        sink: &dyn TurnSink,
        turn: &Turn,
    ) -> Result<Option<ChatMessage>, ChatError> {
        if !self.settings.enabled {
            return Ok(None);
        }

        sink.typing(turn.session_id, true).await;
        let result = self.respond(sink, turn).await;
        sink.typing(turn.session_id, false).await;
        result.map(Some)
    }

    async fn respond(&self, sink: &dyn TurnSink, turn: &Turn) -> Result<ChatMessage, ChatError> {
        let documents = self
            .knowledge
            .list()
            .map_err(|e| ChatError::Retrieval(e.to_string()))?;
        let grounding = retrieve(&turn.utterance, &documents, self.settings.retrieval_limit);

        let history = self.history(turn)?;
        let bundle =
            InstructionBundle::compose(&self.settings.preamble, &grounding, &history, &turn.utterance);

        let reply = self.chain.generate(&bundle).await?;
        debug!(
            session_id = %turn.session_id,
            provider = %reply.provider,
            sources = bundle.grounding.len(),
            "Automated reply generated"
        );

        let metadata = json!({
            "provider": reply.provider,
            "sources": bundle.source_titles(),
        });
        let message = sink
            .commit(NewMessage::automated(turn.session_id, reply.text, Some(metadata)))
            .await?;
        Ok(message)
    }

    /// The last `history_limit` messages before the current utterance.
    fn history(&self, turn: &Turn) -> Result<Vec<ChatMessage>, ChatError> {
        let limit = self.settings.history_limit;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut recent = self
            .messages
            .recent(turn.session_id, limit + 1)
            .map_err(|e| ChatError::History(e.to_string()))?;
        recent.retain(|m| m.id != turn.message_id);
        if recent.len() > limit {
            recent.drain(..recent.len() - limit);
        }
        Ok(recent)
    }

    /// Spawn a detached run for `turn`.
    ///
    /// Errors and panics stay inside the task; a panic still clears the
    /// typing indicator.
    pub fn spawn_turn(self: Arc<Self>, sink: Arc<dyn TurnSink>, turn: Turn) -> JoinHandle<()> {
        let session_id = turn.session_id;
        let run = {
            let responder = self;
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { responder.run_turn(sink.as_ref(), &turn).await })
        };

        tokio::spawn(async move {
            match run.await {
                Ok(Ok(Some(reply))) => {
                    debug!(session_id = %session_id, message_id = %reply.id, "Automated reply sent");
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(session_id = %session_id, error = %e, "Automated reply failed");
                }
                Err(e) if e.is_panic() => {
                    error!(session_id = %session_id, "Automated reply task panicked");
                    sink.typing(session_id, false).await;
                }
                Err(e) => {
                    debug!(session_id = %session_id, error = %e, "Automated reply task cancelled");
                }
            }
        })
    }
}
