//! Configuration for the development backend.
//!
//! Layered, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasklist-backend/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

/// Errors that can occur when loading backend configuration.
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

/// Top-level TOML file. Every field is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BackendConfigFile {
    server: ServerFileConfig,
    auth: AuthFileConfig,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_frame_size: Option<usize>,
}

/// `[auth]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileConfig {
    federated_email: Option<String>,
    max_failed_logins: Option<u32>,
}

/// CLI arguments for the backend.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Development backend for tasklist")]
pub struct BackendCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "TASKLIST_BACKEND_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/tasklist-backend/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum accepted client frame size in bytes.
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Email of the account that federated sign-in resolves to.
    #[arg(long, env = "TASKLIST_FEDERATED_EMAIL")]
    pub federated_email: Option<String>,

    /// Consecutive failed logins before an email is locked out.
    #[arg(long)]
    pub max_failed_logins: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKLIST_BACKEND_LOG")]
    pub log_level: String,
}

/// Fully resolved backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Address to bind the server to (e.g., `127.0.0.1:9100`).
    pub bind_addr: String,
    /// Maximum accepted client frame size in bytes.
    pub max_frame_size: usize,
    /// Federated account email; federated sign-in is refused when unset.
    pub federated_email: Option<String>,
    /// Lockout threshold for failed logins.
    pub max_failed_logins: u32,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9100".to_string(),
            max_frame_size: 64 * 1024,
            federated_email: None,
            max_failed_logins: 5,
            log_level: "info".to_string(),
        }
    }
}

impl BackendConfig {
    /// Loads configuration by merging CLI args, env vars and a TOML file.
    ///
    /// An explicit `--config` that cannot be read is an error; a missing
    /// default file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &BackendCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    fn resolve(cli: &BackendCliArgs, file: &BackendConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_frame_size: cli
                .max_frame_size
                .or(file.server.max_frame_size)
                .unwrap_or(defaults.max_frame_size),
            federated_email: cli
                .federated_email
                .clone()
                .or_else(|| file.auth.federated_email.clone()),
            max_failed_logins: cli
                .max_failed_logins
                .or(file.auth.max_failed_logins)
                .unwrap_or(defaults.max_failed_logins),
            log_level: cli.log_level.clone(),
        }
    }
}

fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<BackendConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(BackendConfigFile::default());
    };
    let path = config_dir.join("tasklist-backend").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BackendConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
