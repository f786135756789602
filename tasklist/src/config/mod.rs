//! Configuration system for the `tasklist` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasklist/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::remote::RemoteOptions;
use crate::session::DEFAULT_AUTH_TIMEOUT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    backend: BackendFileConfig,
    session: SessionFileConfig,
    ui: UiFileConfig,
}

/// `[backend]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BackendFileConfig {
    url: Option<String>,
    connect_timeout_secs: Option<u64>,
    federated_provider: Option<String>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    auth_timeout_secs: Option<u64>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Backend --
    /// Backend WebSocket URL. `None` runs offline.
    pub backend_url: Option<String>,
    /// Timeout for connecting to the backend.
    pub connect_timeout: Duration,
    /// Provider name sent with federated sign-in.
    pub federated_provider: String,

    // -- Session --
    /// Wait for the first identity notification before assuming signed out.
    pub auth_timeout: Duration,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let remote = RemoteOptions::default();
        Self {
            backend_url: None,
            connect_timeout: remote.connect_timeout,
            federated_provider: remote.federated_provider,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// Otherwise the default path (`~/.config/tasklist/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            backend_url: cli
                .backend_url
                .clone()
                .or_else(|| file.backend.url.clone())
                .filter(|url| !url.trim().is_empty()),
            connect_timeout: file
                .backend
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            federated_provider: file
                .backend
                .federated_provider
                .clone()
                .unwrap_or(defaults.federated_provider),
            auth_timeout: file
                .session
                .auth_timeout_secs
                .map_or(defaults.auth_timeout, Duration::from_secs),
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// Options for [`crate::remote::RemoteBackend::connect`].
    #[must_use]
    pub fn remote_options(&self) -> RemoteOptions {
        RemoteOptions {
            connect_timeout: self.connect_timeout,
            federated_provider: self.federated_provider.clone(),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal to-do list with accounts")]
pub struct CliArgs {
    /// WebSocket URL of the backend (e.g. `ws://127.0.0.1:9100/ws`).
    /// Without it the client runs offline.
    #[arg(long, env = "TASKLIST_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Path to config file (default: `~/.config/tasklist/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKLIST_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/tasklist.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist. Otherwise the default
/// path is tried and a missing file is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("tasklist").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
