//! frcs-si (Scouting Ingest) - entry point
//!
//! `serve` (default) accepts payloads over HTTP; `scan` reads decoded QR
//! texts from stdin, one per line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frcs_common::config::{self, TomlConfig};
use frcs_common::store::RecordStore;
use frcs_si::scan::ScanFeed;
use frcs_si::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// FRC scouting ingest service
#[derive(Parser, Debug)]
#[command(name = "frcs-si")]
#[command(version, about)]
struct Cli {
    /// Root folder holding scouting_data.db (overrides FRCS_ROOT_FOLDER and config)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (overrides FRCS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP submission API
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "FRCS_SI_PORT")]
        port: Option<u16>,

        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Ingest decoded QR texts from stdin, one per line
    Scan {
        /// Process a line even if it repeats the previous scan
        #[arg(long)]
        allow_repeats: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = config::locate_config_file(cli.config.as_deref());
    let toml_config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    // stdout carries scan results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting FRCS Scouting Ingest (frcs-si) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_file {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        _ => info!("No config file found, using defaults"),
    }

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), &toml_config);
    let schema = Arc::new(
        config::load_schema(&toml_config, &root_folder).context("Failed to load field schema")?,
    );
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let store = RecordStore::open(&db_path, schema)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    info!("✓ Record store ready");

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        bind: None,
    }) {
        Command::Serve { port, bind } => {
            let port = port.unwrap_or(toml_config.port);
            let bind = bind.unwrap_or_else(|| toml_config.bind_address.clone());
            serve(store, &bind, port).await
        }
        Command::Scan { allow_repeats } => {
            let suppress = toml_config.duplicate_scan_suppression && !allow_repeats;
            scan(store, suppress).await
        }
    }
}

async fn serve(store: RecordStore, bind: &str, port: u16) -> Result<()> {
    let app = build_router(AppState::new(store));
    let addr = format!("{}:{}", bind, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("frcs-si listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn scan(store: RecordStore, suppress_repeats: bool) -> Result<()> {
    let mut feed = ScanFeed::new(frcs_common::ingest::IngestPipeline::new(store), suppress_repeats);
    println!("Scan feed ready. One payload per line; 's' shows statistics; Ctrl+D to finish.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let totals = feed.run(stdin, &mut stdout).await.context("Scan feed failed")?;
    info!(
        "Scan session finished: {} saved, {} conflicts parked, {} rejected",
        totals.accepted, totals.conflicting, totals.rejected
    );
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
