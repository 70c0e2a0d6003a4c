//! S6: concurrent put/get against a single key on a real node server (§8).
//!
//! 32 workers race to `Put("k", i)` over real TCP connections into one
//! `loopcache-node` instance, each reading the value back afterward. The
//! final value must be whatever exactly one of the writers sent, and
//! `UsedBytes` must never be observed above `MaxBytes` at any sampled point
//! — both properties the node's single per-connection-task, single-lock
//! `Store` is supposed to guarantee (§4.2 Concurrency).

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;
use loopcache_corelib::vnode::DEFAULT_GRANULARITY;
use loopcache_node::migration;
use loopcache_node::state::NodeState;
use loopcache_node::server;
use loopcache_streaming::{frame, ConfigPayload, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn roundtrip(addr: std::net::SocketAddr, request: Message) -> Message {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let (code, payload) = request.encode();
    frame::write_frame(&mut stream, code, &payload).await.unwrap();
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES)
        .await
        .unwrap();
    Message::decode(response.message_type, &response.payload).unwrap()
}

#[tokio::test]
async fn s6_concurrent_put_get_single_key() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let id = NodeId::new("127.0.0.1", addr.port() as u32);

    let (migration_tx, migration_rx) = migration::channel(migration::DEFAULT_QUEUE_CAPACITY);
    let state = Arc::new(NodeState::new(
        id.clone(),
        1 << 20,
        "127.0.0.1:1".to_string(), // no master needed: ring is self-owning below
        migration_tx.clone(),
    ));

    // Seed the node's cached ring so every key routes to itself.
    let ring = RingConfig::empty().add_node(id, DEFAULT_GRANULARITY).unwrap();
    state.apply_new_ring(&ConfigPayload::from_ring(&ring));

    tokio::spawn(migration::run_sender_pool(
        migration_rx,
        migration::DEFAULT_WORKER_COUNT,
        state.clone(),
        migration_tx,
    ));
    tokio::spawn(server::run_on(listener, state));

    const N: u32 = 32;
    let mut handles = Vec::new();
    for i in 0..N {
        handles.push(tokio::spawn(async move {
            let response = roundtrip(
                addr,
                Message::PutObject {
                    key: "k".to_string(),
                    value: vec![i as u8],
                    flags: 0,
                },
            )
            .await;
            assert!(matches!(response, Message::Ok), "put {i} did not succeed: {response:?}");

            // Sample stats right after our own write completes; must never
            // show UsedBytes above MaxBytes (§8 invariant 2).
            let stats = roundtrip(addr, Message::GetStats { target: None }).await;
            if let Message::StatsResponse { max_bytes, used_bytes, .. } = stats {
                assert!(used_bytes <= max_bytes);
            } else {
                panic!("unexpected stats response: {stats:?}");
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let final_value = match roundtrip(addr, Message::GetObject { key: "k".to_string() }).await {
        Message::ObjectValue { value } => value,
        other => panic!("expected a hit after concurrent puts, got {other:?}"),
    };
    assert_eq!(final_value.len(), 1);
    assert!(final_value[0] < N as u8);
}
