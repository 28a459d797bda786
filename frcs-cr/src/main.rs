//! frcs-cr (Conflict Resolution) - entry point
//!
//! Operator tool for collapsing conflicting duplicate observations into one
//! canonical record per (match, team, alliance).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frcs_common::config::{self, TomlConfig};
use frcs_common::resolve::ConflictResolver;
use frcs_common::store::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// FRC scouting conflict resolution
#[derive(Parser, Debug)]
#[command(name = "frcs-cr")]
#[command(version, about)]
struct Cli {
    /// Root folder holding scouting_data.db (overrides FRCS_ROOT_FOLDER and config)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (overrides FRCS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Clear a reconciliation lock left behind by a crashed pass
    #[arg(long)]
    force_unlock: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every conflict group and its differences
    List,
    /// Resolve conflict groups interactively (default)
    Resolve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let toml_config = TomlConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting FRCS Conflict Resolution (frcs-cr) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = config::resolve_root_folder(cli.root_folder.as_deref(), &toml_config);
    let schema = Arc::new(
        config::load_schema(&toml_config, &root_folder).context("Failed to load field schema")?,
    );
    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let store = RecordStore::open(&db_path, schema)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;

    if cli.force_unlock {
        if store.force_release_maintenance_lock().await? {
            warn!("Cleared stale reconciliation lock");
            println!("Reconciliation lock cleared.");
        } else {
            println!("No reconciliation lock was held.");
        }
    }

    let resolver = ConflictResolver::new(store);
    let mut stdout = std::io::stdout();

    match cli.command.unwrap_or(Command::Resolve) {
        Command::List => {
            frcs_cr::list_conflicts(&resolver, &mut stdout).await?;
        }
        Command::Resolve => {
            let mut input = BufReader::new(tokio::io::stdin());
            let summary = frcs_cr::run_pass(&resolver, &mut input, &mut stdout, ctrl_c())
                .await
                .context("Reconciliation pass failed")?;
            if summary.interrupted {
                // The blocking stdin reader cannot be cancelled, so runtime
                // shutdown would wait for the next line of input
                std::process::exit(130);
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C
async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
