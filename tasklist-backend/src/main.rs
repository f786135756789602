//! Development backend for `tasklist`: task documents plus an identity
//! service, served over a WebSocket at `/ws`.
//!
//! # Usage
//!
//! ```bash
//! # Run on the default address 127.0.0.1:9100
//! cargo run --bin tasklist-backend
//!
//! # Custom address, with federated sign-in enabled
//! cargo run --bin tasklist-backend -- --bind 0.0.0.0:9100 --federated-email me@example.com
//! ```

use std::sync::Arc;

use clap::Parser;
use tasklist_backend::accounts::AccountRegistry;
use tasklist_backend::config::{BackendCliArgs, BackendConfig};
use tasklist_backend::server::{self, BackendState};

#[tokio::main]
async fn main() {
    let cli = BackendCliArgs::parse();

    let config = match BackendConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_env("TASKLIST_BACKEND_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        addr = %config.bind_addr,
        federated = config.federated_email.is_some(),
        "starting tasklist backend"
    );

    let accounts = AccountRegistry::with_config(
        config.federated_email.clone(),
        config.max_failed_logins,
    );
    let state = Arc::new(BackendState::with_config(config.max_frame_size, accounts));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "backend listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "backend server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start backend");
            std::process::exit(1);
        }
    }
}
