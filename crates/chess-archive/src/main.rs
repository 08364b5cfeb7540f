//! Chess archive entry point.
//!
//! # Usage
//!
//! ```bash
//! # One run, then exit (non-zero on failure)
//! chess-archive run
//!
//! # One run against in-memory stores; only the source is contacted
//! chess-archive run --dry-run
//!
//! # Serve Pub/Sub push deliveries on TRIGGER_BIND_ADDR
//! chess-archive serve
//! ```
//!
//! All settings come from the environment (see `Config::from_env`), with an
//! optional `.env` file loaded first.

use anyhow::{Context, Result};
use axum::http::Request;
use chess_archive::app::{Stores, build_archiver};
use chess_archive::trigger::{TriggerState, router};
use chess_archive::{Config, RateLimiter};
use chess_archive_core::metrics::{init_metrics, start_metrics_server};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Incremental chess game archiver.
#[derive(Parser, Debug)]
#[command(name = "chess-archive")]
#[command(about = "Sync finished chess games into durable archives")]
#[command(version)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the archiver once.
    Run {
        /// Use in-memory stores instead of ClickHouse and S3.
        #[arg(long)]
        dry_run: bool,
    },
    /// Serve the message-queue trigger endpoint.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)
            .with_context(|| format!("Failed to load {}", args.dotenv))?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    if config.metrics_port > 0 {
        let handle = init_metrics().context("Failed to install metrics recorder")?;
        start_metrics_server(config.metrics_port, handle)
            .await
            .context("Failed to start metrics server")?;
    }

    // One limiter for the whole process.
    let limiter = RateLimiter::new(config.lichess.requests_per_sec);

    match args.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => {
            let stores = if dry_run { Stores::Memory } else { Stores::Remote };
            let archiver = build_archiver(&config, limiter, stores)
                .await
                .context("Failed to assemble archiver")?;

            let stats = tokio::time::timeout(config.timeout, archiver.run())
                .await
                .with_context(|| format!("Run timed out after {:?}", config.timeout))?
                .context("Archive run failed")?;

            println!("{}", serde_json::to_string(&stats)?);
        }
        Command::Serve => {
            let archiver = build_archiver(&config, limiter, Stores::Remote)
                .await
                .context("Failed to assemble archiver")?;
            let state = TriggerState::new(Arc::new(archiver), config.timeout);

            let app = router(state).layer(TraceLayer::new_for_http().make_span_with(
                |request: &Request<_>| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ));

            let listener = tokio::net::TcpListener::bind(&config.trigger_bind_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.trigger_bind_addr))?;
            tracing::info!(addr = %config.trigger_bind_addr, "trigger server listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutdown signal received, stopping gracefully...");
                })
                .await?;
        }
    }

    Ok(())
}
