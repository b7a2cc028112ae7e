//! Load balancer control plane (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   lb.toml ──▶ config::loader ──▶ Reconciler::activate ◀── config::watcher (reload)
//!                                        │
//!              ┌─────────────────────────┼──────────────────────────┐
//!              ▼                         ▼                          ▼
//!        transport::http          transport::tcp             health::active
//!        (Listener + axum)        (Listener + splice)        (one task per frontend)
//!              │                         │                          │
//!              └──────────────▶ model::ServerPool ◀─────────────────┘
//!                               (RwLock<LiveServer>, SharedLbState)
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use lb_control::config::load_config;
use lb_control::config::watcher::ConfigWatcher;
use lb_control::observability::{logging, metrics};
use lb_control::Reconciler;

#[derive(Parser)]
#[command(name = "lb-control")]
#[command(about = "Load balancer control plane", long_about = None)]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, default_value = "lb.toml")]
    config: PathBuf,

    /// Validate the configuration, print a summary and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    if cli.check {
        let frontends: Vec<_> = config
            .frontends
            .iter()
            .map(|f| {
                json!({
                    "row_id": f.row_id,
                    "type": f.kind,
                    "ports": f.ports,
                    "server_pools": f.server_pools.iter().map(|p| &p.name).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "frontends": frontends }))?);
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("lb-control v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let reconciler = Reconciler::new();
    let report = reconciler.activate(config).await?;
    tracing::info!(report = %serde_json::to_string(&report)?, "Initial configuration active");

    let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(desired) = updates.recv() => {
                match reconciler.activate(desired).await {
                    Ok(report) => tracing::info!(
                        outcome = report.outcome().as_str(),
                        report = %serde_json::to_string(&report)?,
                        "Reload applied"
                    ),
                    Err(e) => tracing::error!(error = %e, "Reload rejected, keeping current configuration"),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    reconciler.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
