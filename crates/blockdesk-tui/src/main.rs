//! Blockdesk - a terminal console for an indicator-of-compromise blocklist.
//!
//! Analysts block and unblock IPs, domains and URLs, browse the blocklist and
//! its audit trail; administrators also manage API keys and read the API
//! request log.

mod app;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blockdesk_core::api::ApiClient;
use blockdesk_core::auth::{CredentialStore, SessionManager, SessionStore};
use blockdesk_core::config::{Config, API_KEY_ENV};
use blockdesk_core::models::IndicatorType;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE: &str = "blockdesk.log";

const USAGE: &str = "\
Usage: blockdesk [COMMAND]

Without a command, starts the interactive console.

Commands:
  --export <ip|domain|url>  Print the indicators of one type as JSON
  --raw <ip|domain|url>     Print the public plain-text list of one type
  --store-api-key           Save an API key in the OS keychain
  --forget-api-key          Remove the saved API key
  --help                    Show this message";

/// Initialize the tracing subscriber for logging.
///
/// The terminal belongs to the UI, so logs go to a file in the cache
/// directory. Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = config
        .cache_dir()
        .and_then(|dir| std::fs::create_dir_all(&dir).map(|_| dir).map_err(Into::into));

    match log_dir {
        Ok(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_default();
    let _log_guard = init_tracing(&config);

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if let Some(command) = args.get(1) {
        return run_command(command, args.get(2).map(String::as_str), &config).await;
    }

    info!("Blockdesk starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = match App::new() {
        Ok(mut app) => {
            if app.restore_session().await {
                app.refresh_all();
            } else {
                app.start_login();
            }
            run_app(&mut terminal, &mut app).await
        }
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Blockdesk shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Apply finished requests before drawing
        app.check_background_tasks();
        if app.is_authenticated() {
            app.sync_session().await;
        }
        app.tick();

        terminal.draw(|frame| render(frame, app))?;

        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Non-interactive commands
// ============================================================================

async fn run_command(command: &str, arg: Option<&str>, config: &Config) -> Result<()> {
    match command {
        "--export" => {
            let kind = parse_kind(arg)?;
            let client = command_client(config).await?;
            let indicators = client.fetch_indicators(kind).await?;
            println!("{}", serde_json::to_string_pretty(&indicators)?);
            Ok(())
        }
        "--raw" => {
            let kind = parse_kind(arg)?;
            let session = SessionManager::new(config.api_url())?;
            let client = ApiClient::from_session(Arc::new(session));
            print!("{}", client.fetch_raw_blocklist(kind).await?);
            Ok(())
        }
        "--store-api-key" => {
            let key = rpassword::prompt_password("API key: ").context("Failed to read API key")?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("No API key entered");
            }
            CredentialStore::store_api_key(key)?;
            eprintln!("API key saved to the keychain.");
            Ok(())
        }
        "--forget-api-key" => {
            CredentialStore::delete_api_key()?;
            eprintln!("API key removed from the keychain.");
            Ok(())
        }
        "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => {
            eprintln!("{USAGE}");
            anyhow::bail!("Unknown command: {other}")
        }
    }
}

fn parse_kind(arg: Option<&str>) -> Result<IndicatorType> {
    let arg = arg.context("Missing indicator type (ip, domain or url)")?;
    Ok(arg.parse()?)
}

/// Client for scripted use: an API key from the environment or keychain,
/// else the session saved by the interactive console.
async fn command_client(config: &Config) -> Result<ApiClient> {
    let api_url = config.api_url();

    let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
    let key = match env_key {
        Some(key) => Some(key),
        None => CredentialStore::api_key().unwrap_or_else(|e| {
            warn!(error = %e, "Keychain unavailable");
            None
        }),
    };
    if let Some(key) = key {
        return Ok(ApiClient::with_api_key(api_url, key.trim())?);
    }

    let session = SessionManager::new(api_url)?
        .with_store(SessionStore::new(&config.cache_dir()?));
    if !session.restore().await {
        anyhow::bail!(
            "Not logged in. Set {API_KEY_ENV}, run --store-api-key, or log in with the console first."
        );
    }
    Ok(ApiClient::from_session(Arc::new(session)))
}
