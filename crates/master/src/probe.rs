//! Active node probing (§4.3: `NodeDown` "triggers a probe").
//!
//! A probe is a direct `GetStats` round-trip to the node in question. Success
//! promotes the node back to Up immediately rather than waiting out the
//! health sweep's silence window.

use crate::state::MasterState;
use loopcache_corelib::node::NodeId;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn probe_node(state: Arc<MasterState>, id: NodeId) {
    match timeout(PROBE_TIMEOUT, probe_once(&id)).await {
        Ok(Ok(())) => {
            info!(node = %id, "probe succeeded, promoting to Up");
            state.mark_node_contacted(&id);
        }
        Ok(Err(err)) => debug!(node = %id, %err, "probe failed"),
        Err(_) => debug!(node = %id, "probe timed out"),
    }
}

async fn probe_once(id: &NodeId) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect((id.host.as_str(), id.port as u16)).await?;
    let (code, payload) = Message::GetStats { target: None }.encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    match Message::decode(response.message_type, &response.payload)? {
        Message::StatsResponse { .. } => Ok(()),
        other => anyhow::bail!("unexpected probe response: {other:?}"),
    }
}
