//! Automated replies for Frontdesk.
//!
//! Keyword retrieval over the knowledge store, instruction bundle
//! composition, the ordered completion-provider chain, and the per-turn
//! responder pipeline that the gateway spawns after each visitor message.

pub mod error;
pub mod prompt;
pub mod provider;
pub mod responder;
pub mod retrieval;

pub use error::ChatError;
pub use prompt::InstructionBundle;
pub use provider::{ProviderChain, ProviderError, ProviderReply, ResponseProvider};
pub use responder::{AutomatedResponder, Turn, TurnSink};
pub use retrieval::retrieve;
