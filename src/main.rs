// Copyright (c) 2026 voltwatch
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/voltwatch/voltwatch-rs

//! VoltWatch - Three-Phase Voltage Quality Monitor
//!
//! Polls a smart-meter gateway, runs every reading through the voltage
//! analytics pipeline and serves the results over a JSON HTTP API.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use voltwatch::{api, db::Database, Config, Poller, SimulatedGateway, StateStore, VERSION};

/// VoltWatch - Three-Phase Voltage Quality Monitor
#[derive(Parser, Debug)]
#[command(name = "voltwatch")]
#[command(author = "VoltWatch Project")]
#[command(version = VERSION)]
#[command(about = "Voltage quality monitoring and ESO compliance tracking")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// HTTP API port
    #[arg(long)]
    port: Option<u16>,

    /// Seconds between gateway polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VoltWatch v{} - Three-Phase Voltage Quality Monitor", VERSION);

    // Load or create configuration
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(interval) = args.poll_interval {
        config.poller.interval_seconds = interval;
    }
    if let Some(data_dir) = args.data_dir {
        config.database.path = data_dir.join("voltwatch.db");
        config.data_dir = data_dir;
    }

    info!("Using configuration at {}", config_path.display());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    // Archive database
    let db = if config.database.enabled {
        let db = Database::open(&config.database)?;
        match db.cleanup() {
            Ok(_) => {}
            Err(e) => warn!("Archive cleanup failed: {}", e),
        }
        if let Ok(stats) = db.get_stats() {
            info!(
                "Archive holds {} windows, {} anomalies",
                stats.window_count, stats.anomaly_count
            );
        }
        Some(Arc::new(db))
    } else {
        None
    };

    // Analytics store
    let store = Arc::new(RwLock::new(StateStore::new(
        config.thresholds.clone(),
        &config.store,
    )));

    // Shutdown signal shared by every task
    let (shutdown_tx, _) = broadcast::channel(1);

    // Gateway poller
    let gateway = SimulatedGateway::new(&config.poller.gateway_id);
    let poller = Poller::new(Box::new(gateway), store.clone(), db, &config.poller);
    let poller_handle = tokio::spawn(poller.run(shutdown_tx.subscribe()));

    // HTTP API
    let state = api::AppState::new(store, config.thresholds.clone());
    let api_handle = tokio::spawn({
        let api_config = config.api.clone();
        let shutdown = shutdown_tx.subscribe();
        async move { api::serve(&api_config, state, shutdown).await }
    });

    info!("VoltWatch running - press Ctrl+C to shut down");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, cleaning up...");
    let _ = shutdown_tx.send(());

    if let Err(e) = poller_handle.await? {
        warn!("Poller exited with error: {}", e);
    }
    if let Err(e) = api_handle.await? {
        warn!("API server exited with error: {}", e);
    }

    info!("VoltWatch shutdown complete");
    Ok(())
}
