use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vb_domain::config::{Config, ConfigSeverity, DeploymentProfile};
use vb_gateway::app;
use vb_gateway::state::AppState;
use vb_order_backend::OrderBackendClient;
use vb_sessions::TranscriptSink;
use vb_tools::{HttpEmailAdapter, ToolDispatcher};

#[derive(Parser)]
#[command(name = "voicebridge", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, global = true, default_value = "voicebridge.toml")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the bridge server (default when no subcommand is given).
    Serve,
    /// Validate configuration and required environment variables without
    /// starting the server.
    Doctor,
    /// Print the version and exit.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let config = load_config(&cli.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Doctor) => {
            let config = load_config(&cli.config)?;
            run_doctor(&config)
        }
        Some(Command::Version) => {
            println!("voicebridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    Config::load_from_path(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vb_gateway=debug")),
        )
        .json()
        .init();
}

/// `voicebridge doctor`: validate config and report every issue without
/// starting the server. Exits non-zero if anything would bail at startup.
fn run_doctor(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    if issues.is_empty() {
        println!("config OK — no issues found");
    }
    for issue in &issues {
        println!("{issue}");
    }
    if config.has_fatal_issues(&issues) {
        println!("\n{} issue(s) would prevent startup", issues.len());
        std::process::exit(1);
    }
    println!("\nconfig is fit to serve");
    Ok(())
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("voicebridge starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if config.has_fatal_issues(&issues) {
        anyhow::bail!(
            "config validation failed with {} issue(s){}",
            issues.len(),
            match config.deployment_profile {
                DeploymentProfile::Production => " (production profile escalates warnings)",
                DeploymentProfile::Development => "",
            }
        );
    }

    // ── Order backend client ─────────────────────────────────────────
    let order_backend = Arc::new(
        OrderBackendClient::new(&config.order_backend).context("initializing order backend client")?,
    );
    tracing::info!(base_url = %config.order_backend.base_url, "order backend client ready");

    // ── Tool dispatcher (order backend + optional email adapter) ─────
    let email_adapter: Option<Box<dyn vb_tools::EmailAdapter>> = if config.email.enabled {
        let api_key = std::env::var(&config.email.api_key_env)
            .with_context(|| format!("{} not set but email.enabled = true", config.email.api_key_env))?;
        tracing::info!(base_url = %config.email.base_url, "email delivery enabled");
        Some(Box::new(HttpEmailAdapter::new(
            config.email.base_url.clone(),
            api_key,
            config.email.from_address.clone(),
        )))
    } else {
        tracing::info!("email delivery disabled — send_email tool will report unavailable");
        None
    };
    let tool_dispatcher = Arc::new(ToolDispatcher::new(
        order_backend.clone(),
        email_adapter,
        config.email.enabled,
        config.email.shop_name.clone(),
    ));
    let tool_defs = Arc::new(vb_tools::tool_definitions());
    tracing::info!(tool_count = tool_defs.len(), "tool dispatcher ready");

    // ── Transcript sink ───────────────────────────────────────────────
    let transcript_dir = config
        .server
        .transcript_dir
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("./transcripts"));
    std::fs::create_dir_all(&transcript_dir)
        .with_context(|| format!("creating transcript directory {}", transcript_dir.display()))?;
    let transcript_sink = Arc::new(TranscriptSink::new(transcript_dir.clone()));
    tracing::info!(path = %transcript_dir.display(), "transcript sink ready");

    // ── App state ──────────────────────────────────────────────────────
    let state = AppState {
        config: config.clone(),
        order_backend,
        tool_dispatcher,
        tool_defs,
        transcript_sink,
    };

    // ── Router ───────────────────────────────────────────────────────
    let app = app::router(state);

    // ── Bind ─────────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "voicebridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    Ok(())
}

/// Waits for either ctrl-c or a SIGTERM so the process can drain in-flight
/// calls before the runtime drops their sockets.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight calls");
}
