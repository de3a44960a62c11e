//! Error types for the automated responder.

use frontdesk_core::error::FrontdeskError;

use crate::provider::ProviderError;

/// Errors that abort a single automated turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("history error: {0}")]
    History(String),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("commit error: {0}")]
    Commit(String),
}

impl From<FrontdeskError> for ChatError {
    fn from(err: FrontdeskError) -> Self {
        ChatError::Commit(err.to_string())
    }
}
