//! Shared domain model for the Frontdesk support-chat gateway.
//!
//! Holds the session/message/knowledge types, the session lifecycle state
//! machine, server-to-client wire events, configuration, the staff
//! credential capability, and the workspace-wide error type.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod types;

pub use auth::{AgentIdentity, CredentialVerifier, StaticCredentialVerifier};
pub use config::FrontdeskConfig;
pub use error::{FrontdeskError, Result};
pub use events::ServerEvent;
pub use lifecycle::{validate_transition, LifecycleEvent};
pub use types::*;
