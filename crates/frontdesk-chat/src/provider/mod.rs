//! Completion providers and the ordered fallback chain.
//!
//! Each provider is a trait object behind [`ResponseProvider`]; the
//! responder only ever talks to a [`ProviderChain`].

pub mod anthropic;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use frontdesk_core::config::{ProviderConfig, ProviderKind, ResponderConfig};

use crate::prompt::InstructionBundle;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Provider name recorded on replies produced from the fallback text.
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }
}

/// A completion backend.
#[async_trait]
pub trait ResponseProvider: Send + Sync {
    /// Short identifier recorded in reply metadata.
    fn name(&self) -> &str;

    /// Whether the provider has the credentials and model it needs.
    fn is_configured(&self) -> bool;

    /// Generate a reply for the bundle.
    async fn generate(&self, bundle: &InstructionBundle) -> Result<String, ProviderError>;
}

/// Text produced for a turn and where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub provider: String,
}

impl ProviderReply {
    pub fn is_fallback(&self) -> bool {
        self.provider == FALLBACK_PROVIDER
    }
}

/// Ordered provider list with a canned fallback.
///
/// Unconfigured providers are skipped and the first configured one answers.
/// A failure of that provider is returned as-is; the chain does not move on
/// to the next entry. Only when nothing is configured does the fallback text
/// stand in.
pub struct ProviderChain {
    providers: Vec<Arc<dyn ResponseProvider>>,
    fallback_message: String,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(
        providers: Vec<Arc<dyn ResponseProvider>>,
        fallback_message: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            providers,
            fallback_message: fallback_message.into(),
            timeout,
        }
    }

    /// Build the chain described by the responder configuration.
    pub fn from_config(config: &ResponderConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.provider_timeout_secs.max(1));
        let mut providers: Vec<Arc<dyn ResponseProvider>> = Vec::new();
        for entry in &config.providers {
            providers.push(build_provider(entry, timeout)?);
        }

        let chain = Self::new(providers, config.fallback_message.clone(), timeout);
        info!(
            providers = chain.providers.len(),
            configured = chain.configured_count(),
            "Provider chain ready"
        );
        Ok(chain)
    }

    pub fn configured_count(&self) -> usize {
        self.providers.iter().filter(|p| p.is_configured()).count()
    }

    /// Produce a reply from the first configured provider, or the fallback.
    pub async fn generate(&self, bundle: &InstructionBundle) -> Result<ProviderReply, ProviderError> {
        let Some(provider) = self.providers.iter().find(|p| p.is_configured()) else {
            debug!("No configured provider, using fallback message");
            return Ok(ProviderReply {
                text: self.fallback_message.clone(),
                provider: FALLBACK_PROVIDER.to_string(),
            });
        };

        let text = tokio::time::timeout(self.timeout, provider.generate(bundle))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "{} returned an empty reply",
                provider.name()
            )));
        }

        Ok(ProviderReply {
            text,
            provider: provider.name().to_string(),
        })
    }
}

/// Construct the concrete provider for one configuration entry.
pub fn build_provider(
    entry: &ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn ResponseProvider>, ProviderError> {
    let provider: Arc<dyn ResponseProvider> = match entry.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_config(entry, timeout)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(entry, timeout)?),
    };
    Ok(provider)
}

/// Build a `reqwest` client with the per-request timeout applied.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
}

/// Map a non-success HTTP status to a provider error.
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    if status.as_u16() == 429 {
        return ProviderError::RateLimited;
    }
    let body = response.text().await.unwrap_or_default();
    ProviderError::ApiError {
        status: status.as_u16(),
        body,
    }
}
