use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FrontdeskError, Result};

/// Default reply used when no completion provider is configured.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Thanks for your message. Our automated assistant \
is unavailable right now; a member of our team will respond shortly.";

/// Default behavioral preamble for automated replies.
pub const DEFAULT_PREAMBLE: &str = "You are a friendly customer support assistant. Answer \
briefly and politely. Use the reference material when it is relevant and never invent \
policies, prices or order details. If you are unsure, say that a human agent will follow up.";

/// Top-level configuration for the Frontdesk gateway.
///
/// Loaded from `~/.frontdesk/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrontdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl FrontdeskConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FrontdeskConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FrontdeskError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and the generated staff token.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Bind address.
    pub host: String,
    /// HTTP/WebSocket port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.frontdesk/data".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3040,
        }
    }
}

/// Real-time gateway tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Outbound events buffered per connection before events are dropped.
    pub outbound_queue_capacity: usize,
    /// Socket write timeout before a slow connection is closed.
    pub send_timeout_ms: u64,
    /// Longest accepted message body, in characters.
    pub max_message_chars: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 64,
            send_timeout_ms: 5_000,
            max_message_chars: 4_000,
        }
    }
}

/// Automated responder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Feature flag for automated replies.
    pub enabled: bool,
    /// Maximum knowledge documents used as grounding.
    pub retrieval_limit: usize,
    /// Number of most recent messages rendered into the transcript.
    pub history_limit: usize,
    /// Hard timeout for a single provider call.
    pub provider_timeout_secs: u64,
    /// Behavioral preamble placed first in every instruction bundle.
    pub preamble: String,
    /// Reply sent when no provider is configured.
    pub fallback_message: String,
    /// Providers in preference order.
    pub providers: Vec<ProviderConfig>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retrieval_limit: 3,
            history_limit: 10,
            provider_timeout_secs: 30,
            preamble: DEFAULT_PREAMBLE.to_string(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            providers: Vec::new(),
        }
    }
}

/// Supported completion provider APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI Chat Completions, or any server speaking the same API.
    #[serde(rename = "openai")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// One entry in the ordered provider list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Literal API key. Takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: String,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: String,
    /// Override for the provider's API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    512
}

impl ProviderConfig {
    /// The API key from the literal field or, if empty, the named
    /// environment variable. Blank keys resolve to `None`.
    pub fn resolve_api_key(&self) -> Option<String> {
        let literal = self.api_key.trim();
        if !literal.is_empty() {
            return Some(literal.to_string());
        }
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// A staff token and the agent it identifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCredential {
    pub token: String,
    pub agent_id: String,
    #[serde(default)]
    pub name: String,
}

/// Staff credentials accepted by the gateway and the staff HTTP routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub staff: Vec<StaffCredential>,
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Requests per second across the HTTP routes (the socket is exempt).
    pub rate_limit_per_sec: u64,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 100,
            cors_origins: Vec::new(),
        }
    }
}
