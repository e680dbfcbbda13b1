//! Cross-chain swap orchestrator node entry point.
//!
//! Resolves configuration, builds the wired [`swap_node::OrchestratorApp`],
//! and runs its reactor until `Ctrl+C`, draining in-flight operations
//! for a grace period before exiting (spec §5 "Shutdown drains
//! in-flight operations up to a configurable grace period").

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use swap_node::{config_loader, OrchestratorApp};
use swap_telemetry::{init_logging, TelemetryConfig};
use tracing::info;

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let _logging_guard = init_logging(&telemetry).context("failed to initialize logging")?;

    info!("===========================================");
    info!("  Cross-Chain Swap Orchestrator");
    info!("===========================================");

    let config_path = std::env::var("SWAP_CONFIG_FILE").unwrap_or_else(|_| "swap-node.toml".to_string());
    let config = config_loader::load(Some(&config_path)).context("failed to resolve orchestrator configuration")?;

    let app = Arc::new(OrchestratorApp::build(config).context("failed to construct orchestrator components")?);
    info!("orchestrator components constructed, starting reactor");

    let reactor_app = app.clone();
    let reactor_handle = tokio::spawn(async move { reactor_app.run().await });

    tokio::signal::ctrl_c().await.context("failed to install ctrl-c handler")?;
    info!("shutdown requested, draining in-flight operations");

    app.shutdown(SHUTDOWN_GRACE_PERIOD).await;
    let _ = reactor_handle.await;

    info!("shutdown complete");
    Ok(())
}
