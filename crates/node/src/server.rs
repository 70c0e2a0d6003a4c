//! Data-node accept loop (§4.2, §5).
//!
//! "Read the request into memory, then take the lock; take the lock,
//! mutate, drop it, then write the response" — every handler below reads
//! the frame and decodes the message before touching `NodeState`, and the
//! `Store`'s own lock is held only for the duration of the map/LRU mutation.

use crate::state::NodeState;
use loopcache_corelib::storage::{DeleteOutcome, GetOutcome, PutOutcome};
use loopcache_streaming::protocol::{ConfigPayload, PUT_FLAG_MIGRATION};
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

pub async fn run(bind_addr: &str, state: Arc<NodeState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "node listening");
    run_on(listener, state).await
}

/// Same accept loop as `run`, over an already-bound listener — lets tests
/// bind to an ephemeral port and learn its address before the loop starts.
pub async fn run_on(listener: TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
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

async fn handle_connection(mut stream: TcpStream, state: Arc<NodeState>) -> anyhow::Result<()> {
    loop {
        let frame = match frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await {
            Ok(f) => f,
            Err(_) => return Ok(()),
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

fn not_owner(state: &NodeState) -> Message {
    Message::NotOwner(ConfigPayload::from_ring(&state.ring()))
}

async fn dispatch(state: &Arc<NodeState>, message: Message) -> Message {
    match message {
        Message::GetConfig => Message::ConfigResponse(ConfigPayload::from_ring(&state.ring())),
        Message::ChangeConfig(payload) => {
            state.apply_new_ring(&payload);
            Message::Ok
        }
        Message::PutObject { key, value, flags } => handle_put(state, key, value, flags).await,
        Message::GetObject { key } => handle_get(state, &key),
        Message::DeleteObject { key } => handle_delete(state, &key),
        Message::Clear => {
            state.clear();
            Message::Ok
        }
        Message::GetStats { target: None } => {
            let stats = state.stats();
            Message::StatsResponse {
                max_bytes: stats.max_bytes,
                used_bytes: stats.used_bytes,
                num_objects: stats.num_objects,
                version: state.ring().version,
                status: loopcache_corelib::node::NodeStatus::Up.to_wire(),
            }
        }
        Message::GetStats { target: Some(_) } => {
            Message::Error("a data node does not forward GetStats".into())
        }
        other => Message::Error(format!("unsupported request for a data node: {other:?}")),
    }
}

async fn handle_put(state: &Arc<NodeState>, key: String, value: Vec<u8>, flags: u8) -> Message {
    let migration = flags & PUT_FLAG_MIGRATION != 0;
    if !state.is_owner(&key) {
        if migration {
            // The sender computed us as the new owner; our cached ring may
            // just be behind. Refresh once before giving up (§4.4).
            if let Err(err) = state.refresh_from_master().await {
                warn!(%err, "ring refresh during migration-mode put failed");
            }
        }
        if !state.is_owner(&key) {
            return not_owner(state);
        }
    }
    match state.put(key, value) {
        PutOutcome::Ok => Message::Ok,
        PutOutcome::OutOfRoom => Message::OutOfRoom,
    }
}

fn handle_get(state: &Arc<NodeState>, key: &str) -> Message {
    if !state.is_owner(key) {
        return not_owner(state);
    }
    match state.get(key) {
        GetOutcome::Hit(value) => Message::ObjectValue { value },
        GetOutcome::Miss => Message::Miss,
    }
}

fn handle_delete(state: &Arc<NodeState>, key: &str) -> Message {
    if !state.is_owner(key) {
        return not_owner(state);
    }
    match state.delete(key) {
        DeleteOutcome::Ok => Message::Ok,
        DeleteOutcome::Miss => Message::Miss,
    }
}
