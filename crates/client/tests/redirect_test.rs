//! S5: client redirect on stale ring (§8).
//!
//! A client holding a V1 ring sends `Put` to the node it believes owns the
//! key. That node is actually stale too (in this test it just always
//! answers `NotOwner` with a V2 config pointing elsewhere) — the real node
//! for V2 answers `Ok`. The client should adopt V2 and retry exactly once.

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;
use loopcache_corelib::vnode::DEFAULT_GRANULARITY;
use loopcache_client::Client;
use loopcache_streaming::protocol::ConfigPayload;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use tokio::net::TcpListener;

async fn spawn_node_answering_not_owner(redirect_to: RingConfig) -> (NodeId, tokio::task::JoinHandle<u32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let id = NodeId::new("127.0.0.1", addr.port() as u32);
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES)
            .await
            .unwrap();
        let _ = Message::decode(request.message_type, &request.payload).unwrap();
        let (code, payload) = Message::NotOwner(ConfigPayload::from_ring(&redirect_to)).encode();
        frame::write_frame(&mut stream, code, &payload).await.unwrap();
        1u32 // request count observed
    });
    (id, handle)
}

async fn spawn_node_answering_ok() -> (NodeId, tokio::task::JoinHandle<u32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let id = NodeId::new("127.0.0.1", addr.port() as u32);
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES)
            .await
            .unwrap();
        let message = Message::decode(request.message_type, &request.payload).unwrap();
        assert!(matches!(message, Message::PutObject { .. }));
        let (code, payload) = Message::Ok.encode();
        frame::write_frame(&mut stream, code, &payload).await.unwrap();
        1u32
    });
    (id, handle)
}

#[tokio::test]
async fn client_adopts_redirect_and_retries_exactly_once() {
    let (real_owner_id, real_owner_handle) = spawn_node_answering_ok().await;

    // Build a higher-versioned ring by adding a throwaway node first, then
    // removing it — guarantees the redirect's version beats the client's
    // initial (also version-1) ring below.
    let placeholder = NodeId::new("127.0.0.1", 1);
    let v2_ring = RingConfig::empty()
        .add_node(placeholder.clone(), DEFAULT_GRANULARITY)
        .unwrap()
        .add_node(real_owner_id, DEFAULT_GRANULARITY)
        .unwrap()
        .remove_node(&placeholder)
        .unwrap();

    let (stale_owner_id, stale_owner_handle) = spawn_node_answering_not_owner(v2_ring.clone()).await;

    // The client's initial (stale) ring believes `stale_owner_id` owns
    // everything, at a version lower than what the redirect carries.
    let v1_ring = RingConfig::empty().add_node(stale_owner_id, DEFAULT_GRANULARITY).unwrap();
    let client = Client::with_ring("127.0.0.1:1", v1_ring);
    assert!(client.ring_version() < v2_ring.version);

    client.put("some-key", vec![1, 2, 3]).await.unwrap();

    assert_eq!(client.ring_version(), v2_ring.version);
    assert_eq!(stale_owner_handle.await.unwrap(), 1);
    assert_eq!(real_owner_handle.await.unwrap(), 1);
}
