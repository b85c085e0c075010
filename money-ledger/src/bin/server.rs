//! Ledger RPC server binary

use anyhow::Context;
use money_ledger::{rpc, Config, Ledger};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log.level).context("Invalid log level")?,
    };
    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_env_filter(filter)
            .init();
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting ledger server"
    );

    let listen_addr = config.listen_addr.clone();
    let seed = config.seed.enabled;

    let ledger = Ledger::open(config).context("Failed to open ledger")?;
    if seed {
        ledger.seed().context("Failed to seed accounts")?;
    }

    rpc::serve(Arc::new(ledger), &listen_addr)
        .await
        .context("RPC server failed")?;

    tracing::info!("Shutting down ledger server");
    Ok(())
}
