//! vigild — the vigil daemon.
//!
//! # Usage
//!
//! ```text
//! vigild --config /etc/vigil/vigil.toml run
//! vigild --config vigil.toml tick
//! vigild --config vigil.toml check-config
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use vigil_scheduler::TICK_PERIOD;
use vigild::{VigilConfig, build_scheduler, open_store};

#[derive(Parser)]
#[command(name = "vigild", about = "vigil health polling and escalation daemon")]
struct Cli {
    /// Path to vigil.toml.
    #[arg(long, short, global = true, default_value = "vigil.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// SMTP password (overrides [smtp].password).
    #[arg(long, env = "VIGIL_SMTP_PASSWORD", hide_env_values = true, global = true)]
    smtp_password: Option<String>,

    /// Twilio auth token (overrides [voice].auth_token).
    #[arg(long, env = "VIGIL_TWILIO_AUTH_TOKEN", hide_env_values = true, global = true)]
    twilio_auth_token: Option<String>,

    /// API key for AI summaries (overrides [ai].api_key).
    #[arg(long, env = "VIGIL_AI_API_KEY", hide_env_values = true, global = true)]
    ai_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler and REST API until interrupted.
    Run {
        /// Address to listen on (overrides [daemon].listen).
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Data directory for persistent state (overrides [daemon].data_dir).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run a single polling tick and exit.
    Tick {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Parse and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = VigilConfig::from_file(&cli.config)?;
    config.apply_secrets(cli.smtp_password, cli.twilio_auth_token, cli.ai_api_key);
    config.validate()?;

    match cli.command {
        Command::Run { listen, data_dir } => {
            if let Some(listen) = listen {
                config.daemon.listen = listen;
            }
            if let Some(data_dir) = data_dir {
                config.daemon.data_dir = data_dir;
            }
            run_daemon(config).await
        }
        Command::Tick { data_dir } => {
            if let Some(data_dir) = data_dir {
                config.daemon.data_dir = data_dir;
            }
            run_single_tick(config).await
        }
        Command::CheckConfig => {
            println!(
                "{}: ok ({} contacts, {} services)",
                cli.config.display(),
                config.contacts.len(),
                config.services.len()
            );
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,vigild=debug,vigil=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_daemon(config: VigilConfig) -> anyhow::Result<()> {
    info!("vigil daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(&config)?;
    let scheduler = Arc::new(build_scheduler(&config, store.clone())?);
    info!(
        period_secs = TICK_PERIOD.as_secs(),
        max_concurrency = config.daemon.max_concurrency,
        "scheduler initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let ticker = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        ticker.run(shutdown_rx).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = vigil_api::build_router(store, scheduler);
    let addr = config.daemon.listen;
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the scheduler to finish its current tick.
    let _ = scheduler_handle.await;

    info!("vigil daemon stopped");
    Ok(())
}

async fn run_single_tick(config: VigilConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let scheduler = build_scheduler(&config, store)?;
    let report = scheduler.run_tick().await?;
    println!(
        "services={} evaluated={} opened={} escalated={} resolved={} paused={} failed={}",
        report.services,
        report.evaluated,
        report.opened,
        report.escalated,
        report.resolved,
        report.paused,
        report.failed
    );
    Ok(())
}
