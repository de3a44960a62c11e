//! Staff credential verification.
//!
//! Account management lives outside this system; the gateway and the HTTP
//! layer only ask "which agent does this credential belong to?".

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::StaffCredential;

/// A verified staff member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentIdentity {
    pub agent_id: String,
    pub name: String,
}

/// Resolves an opaque staff credential to an agent.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Returns `None` for unknown or malformed credentials.
    async fn verify(&self, credential: &str) -> Option<AgentIdentity>;
}

/// Verifier backed by a fixed token table from configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialVerifier {
    by_token: HashMap<String, AgentIdentity>,
}

impl StaticCredentialVerifier {
    pub fn new(credentials: &[StaffCredential]) -> Self {
        let by_token = credentials
            .iter()
            .filter(|c| !c.token.trim().is_empty())
            .map(|c| {
                (
                    c.token.clone(),
                    AgentIdentity {
                        agent_id: c.agent_id.clone(),
                        name: c.name.clone(),
                    },
                )
            })
            .collect();
        Self { by_token }
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentialVerifier {
    async fn verify(&self, credential: &str) -> Option<AgentIdentity> {
        if credential.is_empty() {
            return None;
        }
        self.by_token.get(credential).cloned()
    }
}
