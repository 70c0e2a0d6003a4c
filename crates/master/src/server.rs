//! Master accept loop (§5: "pool of parallel workers dispatched off an accept loop").

use crate::probe;
use crate::state::MasterState;
use loopcache_corelib::node::NodeId;
use loopcache_streaming::protocol::ConfigPayload;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

pub async fn run(bind_addr: &str, state: Arc<MasterState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "master listening");
    run_on(listener, state).await
}

/// Same accept loop as `run`, over an already-bound listener — lets tests
/// bind to an ephemeral port and learn its address before the loop starts.
pub async fn run_on(listener: TcpListener, state: Arc<MasterState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                warn!(%peer, %err, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<MasterState>) -> anyhow::Result<()> {
    loop {
        let frame = match frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await {
            Ok(f) => f,
            Err(_) => return Ok(()), // peer closed or sent a malformed frame
        };
        let message = match Message::decode(frame.message_type, &frame.payload) {
            Ok(m) => m,
            Err(err) => {
                error!(%err, "unknown or malformed message");
                respond(&mut stream, Message::Error(err.to_string())).await?;
                continue;
            }
        };
        let response = dispatch(&state, message).await;
        respond(&mut stream, response).await?;
    }
}

async fn respond(stream: &mut TcpStream, message: Message) -> anyhow::Result<()> {
    let (code, payload) = message.encode();
    frame::write_frame(stream, code, &payload).await?;
    Ok(())
}

async fn dispatch(state: &Arc<MasterState>, message: Message) -> Message {
    match message {
        Message::GetConfig => Message::ConfigResponse(ConfigPayload::from_ring(&state.ring())),
        Message::Register { host, port, max_bytes } => {
            match state.register(NodeId::new(host, port), max_bytes) {
                Ok((ring, is_new)) => {
                    if is_new {
                        // A first-time Register reshapes the ring exactly
                        // like AddNode does, so the rest of the fleet needs
                        // to hear about it too (§4.3, §4.4).
                        push_config_to_all(state.clone(), ring.clone());
                    }
                    Message::ConfigResponse(ConfigPayload::from_ring(&ring))
                }
                Err(err) => Message::Error(err.to_string()),
            }
        }
        Message::AddNode { host, port, max_bytes } => {
            match state.add_node(NodeId::new(host, port), max_bytes) {
                Ok(ring) => {
                    push_config_to_all(state.clone(), ring.clone());
                    Message::Ok
                }
                Err(err) => Message::Error(err.to_string()),
            }
        }
        Message::RemoveNode { host, port } => {
            match state.remove_node(&NodeId::new(host, port)) {
                Ok(ring) => {
                    push_config_to_all(state.clone(), ring.clone());
                    Message::Ok
                }
                Err(err) => Message::Error(err.to_string()),
            }
        }
        Message::ChangeNode { host, port, new_max_bytes } => {
            match state.change_node(&NodeId::new(host, port), new_max_bytes) {
                Ok(ring) => {
                    push_config_to_all(state.clone(), ring.clone());
                    Message::Ok
                }
                Err(err) => Message::Error(err.to_string()),
            }
        }
        Message::NodeDown { host, port } => {
            let id = NodeId::new(host, port);
            state.node_down_reported(&id);
            tokio::spawn(probe::probe_node(state.clone(), id));
            Message::Ok
        }
        Message::GetStats { target: Some((host, port)) } => {
            forward_get_stats(NodeId::new(host, port)).await
        }
        Message::GetStats { target: None } => {
            Message::Error("GetStats against the master requires a target node".into())
        }
        other => Message::Error(format!("unsupported request for the master: {other:?}")),
    }
}

/// Best-effort push of the new ring to every known node (§4.3: "push is
/// best-effort with retry; nodes also poll on any ownership error").
fn push_config_to_all(state: Arc<MasterState>, ring: Arc<loopcache_corelib::RingConfig>) {
    for id in ring.nodes.keys().cloned() {
        let ring = ring.clone();
        tokio::spawn(async move {
            if let Err(err) = push_config_to(&id, &ring).await {
                warn!(node = %id, %err, "failed to push ChangeConfig; node will poll on next ownership error");
            }
        });
    }
}

async fn push_config_to(id: &NodeId, ring: &loopcache_corelib::RingConfig) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect((id.host.as_str(), id.port as u16)).await?;
    let (code, payload) = Message::ChangeConfig(ConfigPayload::from_ring(ring)).encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    match Message::decode(response.message_type, &response.payload)? {
        Message::Ok => Ok(()),
        other => anyhow::bail!("node rejected ChangeConfig: {other:?}"),
    }
}

async fn forward_get_stats(id: NodeId) -> Message {
    match forward_get_stats_inner(&id).await {
        Ok(m) => m,
        Err(err) => Message::Error(err.to_string()),
    }
}

async fn forward_get_stats_inner(id: &NodeId) -> anyhow::Result<Message> {
    let mut stream = TcpStream::connect((id.host.as_str(), id.port as u16)).await?;
    let (code, payload) = Message::GetStats { target: None }.encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    Ok(Message::decode(response.message_type, &response.payload)?)
}
