//! wa-relay: WhatsApp relay main binary
//!
//! Usage:
//!   wa-relay           - Start the relay (HTTP API + WhatsApp Web session)
//!   wa-relay --help    - Show help
//!   wa-relay --version - Show version

mod logging;

use std::sync::Arc;

use tokio::task::JoinHandle;
use wa_core::{Config, LifecycleLoop, ReconnectionController, SessionClient, event_channel};
use wa_email::{CredentialNotifier, EmailSender};
use wa_whatsapp::{BrowserConfig, WhatsAppWebDriver};

/// Command line action
enum Command {
    /// Run the relay
    Serve,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("wa-relay {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Serve => {}
    }

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    let _log_guards = logging::init(&config.log, config.server.mode)?;

    tracing::info!("Starting wa-relay...");
    tracing::info!("Session dir: {}", config.whatsapp.session_dir.display());

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let (events_tx, events_rx) = event_channel();

    // WhatsApp Web session
    let driver = Arc::new(
        WhatsAppWebDriver::new(BrowserConfig::from_whatsapp_config(&config.whatsapp))
            .with_qr_reload_limit(config.whatsapp.qr_max_reloads),
    );
    let client = Arc::new(SessionClient::new(
        driver.clone(),
        events_tx,
        config.whatsapp.startup_timeout(),
    ));

    // QR code notifications
    let mailer = EmailSender::new(&config.email)
        .map_err(|e| anyhow::anyhow!("Failed to create email sender: {}", e))?;
    let notifier = Arc::new(CredentialNotifier::new(
        Arc::new(mailer),
        config.email.user.clone(),
        config.email.recipient(),
        config.whatsapp.qr_path.clone(),
    ));

    let reconnect =
        ReconnectionController::new(Arc::clone(&client), config.whatsapp.reconnect_delay());
    let lifecycle = LifecycleLoop::new(Arc::clone(&client), reconnect, notifier).spawn(events_rx);

    // HTTP API
    let port = config.server.port;
    let api_client = Arc::clone(&client);
    let server = tokio::spawn(wa_api::start_server(port, api_client, shutdown_signal()));

    // The server accepts requests while the first session is starting
    let init_client = Arc::clone(&client);
    tokio::spawn(async move {
        if let Err(e) = init_client.initialize().await {
            tracing::error!("Client initialization failed: {}", e);
        }
    });

    let served = wait_for_server(server).await;

    lifecycle.abort();
    driver.shutdown();

    match &served {
        Ok(()) => tracing::info!("wa-relay stopped"),
        Err(e) => tracing::error!("HTTP server error: {}", e),
    }
    served
}

/// Wait for the HTTP server task and surface its error
async fn wait_for_server(server: JoinHandle<anyhow::Result<()>>) -> anyhow::Result<()> {
    server
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server task failed: {}", e))?
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down...");
}

/// Parse command line arguments
fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return Command::Help,
            "--version" | "-v" => return Command::Version,
            _ => {}
        }
    }

    Command::Serve
}

/// Show help message
fn print_help() {
    println!("wa-relay - WhatsApp relay");
    println!();
    println!("Usage:");
    println!("  wa-relay            Start the relay");
    println!("  wa-relay --help     Show this help");
    println!("  wa-relay --version  Show version");
    println!();
    println!("Environment Variables:");
    println!("  EMAIL_HOST_USER       SMTP login and sender address (required)");
    println!("  EMAIL_HOST_PASSWORD   SMTP password (required)");
    println!("  EMAIL_TO              QR code recipient (default: EMAIL_HOST_USER)");
    println!("  SMTP_HOST             SMTP relay host (default: smtp.gmail.com)");
    println!("  PORT                  HTTP port (default: 5000)");
    println!("  APP_ENV / NODE_ENV    'production' disables console logging");
    println!("  SESSION_DIR           Browser profile directory (default: sessions)");
    println!("  QR_PATH               Temporary QR image path (default: qrcode.png)");
    println!("  CHROME_PATH           Chrome/Chromium executable");
    println!("  HEADLESS              Run the browser headless (default: true)");
    println!("  STARTUP_TIMEOUT_SECS  Session startup timeout (default: 30)");
    println!("  RECONNECT_DELAY_SECS  Delay before reconnecting (default: 5)");
    println!("  QR_MAX_RELOADS        Expired QR codes before giving up (default: 0, never)");
    println!("  LOG_DIR               Directory for combined.log and error.log (default: .)");
    println!("  RUST_LOG              Log filter (default: info)");
}
