//! LoopCache data-node binary: storage engine, server loop, migration engine.

use clap::Parser;
use loopcache_node::config::{CliArgs, NodeConfig};
use loopcache_node::state::NodeState;
use loopcache_node::{migration, server};
use loopcache_corelib::node::NodeId;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let config = NodeConfig::from_args(&args)?;
    let id = NodeId::new(config.host.clone(), config.port as u32);

    let (migration_tx, migration_rx) = migration::channel(migration::DEFAULT_QUEUE_CAPACITY);
    let state = Arc::new(NodeState::new(
        id.clone(),
        config.max_bytes,
        config.master.clone(),
        migration_tx.clone(),
    ));

    register_with_master(&state).await?;

    tokio::spawn(migration::run_sender_pool(
        migration_rx,
        migration::DEFAULT_WORKER_COUNT,
        state.clone(),
        migration_tx,
    ));

    let heartbeat_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = register_with_master(&heartbeat_state).await {
                warn!(%err, "heartbeat registration failed");
            }
        }
    });

    info!(node = %id, master = %config.master, "starting loopcache-node");
    server::run(&config.bind_addr(), state).await?;
    Ok(())
}

/// `Register(host, port, maxBytes)` against the master, adopting whatever
/// ring it sends back (§3: nodes "re-attach on Register").
async fn register_with_master(state: &Arc<NodeState>) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(&state.master_addr).await?;
    let (code, payload) = Message::Register {
        host: state.id.host.clone(),
        port: state.id.port,
        max_bytes: state.stats().max_bytes,
    }
    .encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    if let Message::ConfigResponse(payload) = Message::decode(response.message_type, &response.payload)? {
        state.apply_new_ring(&payload);
    }
    Ok(())
}
