//! `tasklist`: terminal to-do list with accounts.
//!
//! Runs offline against an in-memory task store by default, or against the
//! development backend when a URL is configured. Configuration via CLI
//! flags, environment variables, or config file
//! (`~/.config/tasklist/config.toml`).
//!
//! ```bash
//! # Offline mode
//! cargo run --bin tasklist
//!
//! # Against a running backend
//! cargo run --bin tasklist-backend &
//! cargo run --bin tasklist -- --backend-url ws://127.0.0.1:9100/ws
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_appender::non_blocking::WorkerGuard;

use tasklist::app::App;
use tasklist::config::{CliArgs, ClientConfig};
use tasklist::identity::IdentityProvider;
use tasklist::identity::local::LocalIdentityProvider;
use tasklist::remote::RemoteBackend;
use tasklist::service::TaskService;
use tasklist::service::memory::InMemoryTaskService;
use tasklist::session::SessionContext;
use tasklist::ui;

/// Account federated sign-in resolves to in offline mode.
const OFFLINE_FEDERATED_EMAIL: &str = "guest@localhost";

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    // Logs go to a file; ratatui owns stdout.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    tracing::info!("tasklist starting");

    let remote = match config.backend_url.as_deref() {
        Some(url) => match RemoteBackend::connect(url, config.remote_options()).await {
            Ok(backend) => {
                tracing::info!(url, "connected to backend");
                Some((Arc::new(backend), url.to_string()))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "backend connection failed, running offline");
                eprintln!("Could not connect to backend, running offline ({e})");
                None
            }
        },
        None => None,
    };

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = if let Some((backend, url)) = remote {
        let session = SessionContext::start(Arc::clone(&backend), config.auth_timeout);
        let app = App::new(session, backend).with_mode_label(format!("backend {url}"));
        run_app(&mut terminal, app, &config).await
    } else {
        let provider = Arc::new(
            LocalIdentityProvider::new().with_federated_account(OFFLINE_FEDERATED_EMAIL),
        );
        let service = Arc::new(InMemoryTaskService::new());
        let session = SessionContext::start(provider, config.auth_timeout);
        let label = if config.backend_url.is_some() {
            "offline (backend unreachable)"
        } else {
            "offline"
        };
        let app = App::new(session, service).with_mode_label(label);
        run_app(&mut terminal, app, &config).await
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    tracing::info!("tasklist exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("tasklist.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main application loop: draw, fold in background results, handle input.
async fn run_app<S, P>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: App<S, P>,
    config: &ClientConfig,
) -> io::Result<()>
where
    S: TaskService + 'static,
    P: IdentityProvider + 'static,
{
    let mut app = app.with_timestamp_format(config.timestamp_format.clone());

    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        app.tick();

        // Let spawned calls make progress between polls.
        tokio::task::yield_now().await;

        if event::poll(config.poll_timeout)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            app.handle_key_event(key);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
