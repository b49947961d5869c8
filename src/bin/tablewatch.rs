//! tablewatch: table change monitor
//!
//! Every poll interval, scans each watched table of each configured project,
//! compares its content fingerprint with the previous cycle and writes update
//! metrics for changed tables to the sink database.
//!
//! ## Configuration
//! - `--config <path>` or `TABLEWATCH_CONFIG`: YAML configuration file
//! - `TABLEWATCH__*`: environment overrides
//! - `PROJECT_COUNT`, `PROJECT_{i}_*`, `CLOUD_DB_*`: flat variables (or `.env`),
//!   used when no projects are configured otherwise
//! - `TABLEWATCH_LOG`: log filter (default `info`)

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use tablewatch::config::Config;
use tablewatch::utils::bootstrap::{build_scheduler, init_tracing};

#[derive(Parser, Debug)]
#[command(
    name = "tablewatch",
    version,
    about = "Polls database tables for content changes and records update metrics"
)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "TABLEWATCH_CONFIG", value_name = "PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let config = Config::resolve(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let scheduler = build_scheduler(&config).await.map_err(|e| {
        error!("Failed to start: {}", e);
        e
    })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                // Keep the sender alive so the scheduler is not stopped.
                error!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });

    info!("tablewatch started, press Ctrl+C to exit");
    scheduler.run(shutdown_rx).await;

    Ok(())
}
