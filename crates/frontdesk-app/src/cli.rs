//! CLI argument definitions for the Frontdesk server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Frontdesk - real-time support chat gateway with automated replies.
#[derive(Parser, Debug)]
#[command(name = "frontdesk", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// HTTP and WebSocket port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Data directory for the SQLite database and staff token.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > FRONTDESK_CONFIG env var > ~/.frontdesk/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config_path_from(std::env::var("FRONTDESK_CONFIG").ok())
    }

    fn config_path_from(&self, env: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env.filter(|p| !p.is_empty()) {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the server port.
    ///
    /// Priority: --port flag > FRONTDESK_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        self.port_from(std::env::var("FRONTDESK_PORT").ok(), config_port)
    }

    fn port_from(&self, env: Option<String>, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Some(p) = env.and_then(|v| v.parse::<u16>().ok()) {
            return p;
        }
        if config_port != 0 {
            return config_port;
        }
        3040
    }

    /// Returns `None` if not overridden (use the config value).
    pub fn resolve_host(&self) -> Option<String> {
        self.host.clone()
    }

    /// Returns `None` if not overridden (use the config value).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Returns `None` if not overridden (use the config value).
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".frontdesk").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

/// The current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let var = "USERPROFILE";
    #[cfg(not(target_os = "windows"))]
    let var = "HOME";
    std::env::var(var).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("frontdesk").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_parse() {
        let cli = parse(&[
            "--config",
            "/etc/frontdesk.toml",
            "-p",
            "8080",
            "--host",
            "0.0.0.0",
            "-d",
            "/var/lib/frontdesk",
            "-l",
            "debug",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/frontdesk.toml")));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.resolve_host().as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.resolve_data_dir().as_deref(), Some("/var/lib/frontdesk"));
        assert_eq!(cli.resolve_log_level().as_deref(), Some("debug"));
    }

    #[test]
    fn test_port_precedence() {
        let flagged = parse(&["--port", "9000"]);
        assert_eq!(flagged.port_from(Some("9100".into()), 3040), 9000);

        let bare = parse(&[]);
        assert_eq!(bare.port_from(Some("9100".into()), 3040), 9100);
        assert_eq!(bare.port_from(Some("not-a-port".into()), 4000), 4000);
        assert_eq!(bare.port_from(None, 4000), 4000);
        assert_eq!(bare.port_from(None, 0), 3040);
    }

    #[test]
    fn test_config_path_precedence() {
        let flagged = parse(&["-c", "a.toml"]);
        assert_eq!(
            flagged.config_path_from(Some("b.toml".into())),
            PathBuf::from("a.toml")
        );

        let bare = parse(&[]);
        assert_eq!(
            bare.config_path_from(Some("b.toml".into())),
            PathBuf::from("b.toml")
        );
        assert!(bare
            .config_path_from(None)
            .ends_with("config.toml"));
    }

    #[test]
    fn test_overrides_default_to_none() {
        let cli = parse(&[]);
        assert!(cli.resolve_host().is_none());
        assert!(cli.resolve_data_dir().is_none());
        assert!(cli.resolve_log_level().is_none());
    }
}
