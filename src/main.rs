//! reqscope: user service with request-scoped context propagation
//!
//! Serves `POST /v1/user` and `POST /v1/update-settings`. Every request gets
//! a request id and client address bound once at the edge and read back by
//! the handlers and the stores beneath them.
//!
//! Usage:
//!   reqscope                                  # Port 8080, user creation disabled
//!   reqscope --enabled                        # Static settings, creation enabled
//!   reqscope --settings ./settings.json       # Settings read from a JSON file
//!   reqscope --strict-scope                   # Refuse requests with no bound scope

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use reqscope_protocol::Route;
use reqscope_server::{AccessLog, Controller, ScopeGuard, ScopeMode};
use reqscope_services::{
    FileSettingsClient, InMemoryUserStore, SettingsClient, StaticSettingsClient, UserSettings,
};
use reqscope_transport::{TransportConfig, TransportServer};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser, Debug)]
#[command(name = "reqscope", about = "User service with request-scoped context")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// JSON file holding user settings, re-read on every settings update
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Enable user creation (static settings only, ignored with --settings)
    #[arg(long)]
    enabled: bool,

    /// Reject requests that reach the controller without a request scope
    #[arg(long)]
    strict_scope: bool,

    /// Take the client address from the first X-Forwarded-For hop
    #[arg(long)]
    trust_forwarded_for: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout: u64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let (writer, ansi) = match cli.log_file {
        Some(ref log_path) => {
            if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("failed to open log file {}", log_path.display()))?;

            eprintln!("Logging to {}", log_path.display());
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);
    if cli.json_logs {
        builder.json().with_current_span(true).init();
    } else {
        builder.with_ansi(ansi).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        request_timeout: Duration::from_secs(cli.request_timeout),
        trust_forwarded_for: cli.trust_forwarded_for,
    };
    let scope_mode = if cli.strict_scope {
        ScopeMode::Strict
    } else {
        ScopeMode::Lenient
    };

    match cli.settings {
        Some(path) => {
            let client = FileSettingsClient::new(path);
            info!(path = %client.path().display(), "Reading user settings from file");
            serve(client, scope_mode, transport_config).await
        }
        None => {
            let settings = UserSettings {
                enabled: cli.enabled,
                ..UserSettings::default()
            };
            info!(enabled = settings.enabled, "Using static user settings");
            serve(StaticSettingsClient::new(settings), scope_mode, transport_config).await
        }
    }
}

async fn serve<S: SettingsClient>(
    settings_client: S,
    scope_mode: ScopeMode,
    transport_config: TransportConfig,
) -> anyhow::Result<()> {
    let mut controller = Controller::new(settings_client, InMemoryUserStore::new());
    controller.add_middleware(ScopeGuard::new(scope_mode));
    controller.add_middleware(AccessLog);
    controller
        .initialize()
        .await
        .context("failed to initialize controller")?;

    let hostname = transport_config.hostname.clone();
    let mut transport = TransportServer::start(transport_config, Arc::new(controller))
        .await
        .context("failed to start transport")?;

    let base = format!("http://{hostname}:{}", transport.port());
    for route in Route::ALL {
        info!(handler = route.name(), "Serving POST {base}{}", route.path());
    }
    info!(url = %base, "Server running, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    transport.stop().await;
    Ok(())
}
