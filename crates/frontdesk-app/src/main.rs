//! Frontdesk application binary - composition root.
//!
//! Ties together all Frontdesk crates into a single executable:
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Open the SQLite store
//! 3. Resolve staff credentials (generating a token when none are configured)
//! 4. Build the automated responder and its provider chain
//! 5. Serve the HTTP API and the WebSocket gateway until Ctrl-C

mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use frontdesk_api::auth::load_or_generate_token;
use frontdesk_api::routes;
use frontdesk_api::state::AppState;
use frontdesk_chat::AutomatedResponder;
use frontdesk_core::auth::{CredentialVerifier, StaticCredentialVerifier};
use frontdesk_core::config::{FrontdeskConfig, StaffCredential};
use frontdesk_storage::Database;

use crate::cli::CliArgs;

/// Expand a leading `~` to the user's home directory.
fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        if let Some(home) = cli::home_dir() {
            return home.join(rest);
        }
    } else if raw == "~" {
        if let Some(home) = cli::home_dir() {
            return home;
        }
    }
    PathBuf::from(raw)
}

/// Staff credentials from config, or a single generated operator token.
fn build_verifier(config: &FrontdeskConfig, data_dir: &Path) -> Arc<dyn CredentialVerifier> {
    let configured = StaticCredentialVerifier::new(&config.auth.staff);
    if !configured.is_empty() {
        tracing::info!(count = configured.len(), "Staff credentials loaded from config");
        return Arc::new(configured);
    }

    let token = load_or_generate_token(&data_dir.join("staff_token"));
    Arc::new(StaticCredentialVerifier::new(&[StaffCredential {
        token,
        agent_id: "operator".to_string(),
        name: "Operator".to_string(),
    }]))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the subscriber.
    let config_file = args.resolve_config_path();
    let loaded = FrontdeskConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => FrontdeskConfig::default(),
    };

    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(host) = args.resolve_host() {
        config.general.host = host;
    }
    config.general.port = args.resolve_port(config.general.port);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Frontdesk v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("frontdesk.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Staff credentials.
    let verifier = build_verifier(&config, &data_dir);

    // Automated responder.
    let responder = Arc::new(AutomatedResponder::from_config(
        &config.responder,
        Arc::clone(&db),
    )?);

    // === API server ===

    let state = AppState::new(config, db, verifier, Some(responder));
    if let Err(e) = routes::start_server(state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server failed, is another instance running?");
        return Err(e.into());
    }

    tracing::info!("Frontdesk stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/frontdesk"), PathBuf::from("/var/lib/frontdesk"));
        assert_eq!(expand_home("data"), PathBuf::from("data"));
    }

    #[test]
    fn test_expand_home_replaces_tilde() {
        if let Some(home) = cli::home_dir() {
            assert_eq!(expand_home("~/.frontdesk/data"), home.join(".frontdesk/data"));
            assert_eq!(expand_home("~"), home);
        }
    }

    #[tokio::test]
    async fn test_verifier_prefers_configured_staff() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FrontdeskConfig::default();
        config.auth.staff.push(StaffCredential {
            token: "tok".to_string(),
            agent_id: "agent-7".to_string(),
            name: "Grace".to_string(),
        });

        let verifier = build_verifier(&config, dir.path());
        assert_eq!(verifier.verify("tok").await.unwrap().agent_id, "agent-7");
        assert!(!dir.path().join("staff_token").exists());
    }

    #[tokio::test]
    async fn test_verifier_generates_operator_token() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = build_verifier(&FrontdeskConfig::default(), dir.path());

        let token = std::fs::read_to_string(dir.path().join("staff_token")).unwrap();
        let agent = verifier.verify(token.trim()).await.unwrap();
        assert_eq!(agent.agent_id, "operator");
        assert!(verifier.verify("guess").await.is_none());
    }
}
