//! LoopCache master binary: ring lifecycle, node registry, health sweep.

use clap::Parser;
use loopcache_master::config::{CliArgs, MasterConfig};
use loopcache_master::state::MasterState;
use loopcache_master::{health, server};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let config = MasterConfig::from_args(&args)?;
    let state = Arc::new(MasterState::new());

    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(health::SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            sweep_state.sweep_health();
        }
    });

    info!(addr = %config.bind_addr(), "starting loopcache-master");
    server::run(&config.bind_addr(), state).await?;
    Ok(())
}
