//! The LoopCache client library (§4.5).
//!
//! Holds `(ring, version)` behind a `parking_lot::RwLock`, routes each
//! operation to `Owner(key)`, and retries once on `NotOwner` before falling
//! back to a fresh fetch from the master. Connection failures are reported
//! to the master as advisory `NodeDown` and surfaced to the caller directly
//! — no transparent failover (the cache is advisory, §4.5).

pub mod error;

pub use error::{ClientError, Result};

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Total attempts per operation: the first shot at the cached owner, one
/// retry against an owner a `NotOwner` redirect names, and one more after
/// an explicit refresh from the master (§4.5).
const MAX_ATTEMPTS: u32 = 3;

pub struct Client {
    master_addr: String,
    ring: RwLock<Arc<RingConfig>>,
}

impl Client {
    /// Construct a client with an empty ring; call `refresh` (or just issue
    /// an operation, which refreshes lazily) before routing anything.
    pub fn new(master_addr: impl Into<String>) -> Self {
        Self {
            master_addr: master_addr.into(),
            ring: RwLock::new(Arc::new(RingConfig::empty())),
        }
    }

    /// Connect and fetch the current ring up front.
    pub async fn connect(master_addr: impl Into<String>) -> Result<Self> {
        let client = Self::new(master_addr);
        client.refresh().await?;
        Ok(client)
    }

    /// Construct a client with a pre-seeded ring, skipping the initial
    /// `GetConfig` round-trip. Mainly useful for tests that want to control
    /// exactly what the client believes before exercising a redirect.
    pub fn with_ring(master_addr: impl Into<String>, ring: RingConfig) -> Self {
        Self {
            master_addr: master_addr.into(),
            ring: RwLock::new(Arc::new(ring)),
        }
    }

    pub fn ring_version(&self) -> u32 {
        self.ring.read().version
    }

    /// `GetConfig()` against the master, adopting the result unconditionally
    /// (a client-initiated refresh always wants the latest).
    pub async fn refresh(&self) -> Result<()> {
        let mut stream = TcpStream::connect(&self.master_addr).await?;
        let (code, payload) = Message::GetConfig.encode();
        frame::write_frame(&mut stream, code, &payload).await?;
        let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
        match Message::decode(response.message_type, &response.payload)? {
            Message::ConfigResponse(payload) => {
                *self.ring.write() = Arc::new(payload.to_ring());
                Ok(())
            }
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .route_with_retry(key, || Message::GetObject { key: key.to_string() })
            .await?;
        match response {
            Message::ObjectValue { value } => Ok(Some(value)),
            Message::Miss => Ok(None),
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    pub async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let response = self
            .route_with_retry(key, || Message::PutObject {
                key: key.to_string(),
                value: value.clone(),
                flags: 0,
            })
            .await?;
        match response {
            Message::Ok => Ok(()),
            Message::OutOfRoom => Err(ClientError::OutOfRoom),
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    /// Returns `true` if the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let response = self
            .route_with_retry(key, || Message::DeleteObject { key: key.to_string() })
            .await?;
        match response {
            Message::Ok => Ok(true),
            Message::Miss => Ok(false),
            other => Err(ClientError::UnexpectedResponse(format!("{other:?}"))),
        }
    }

    /// Route `request()` to `Owner(key)`, adopting any `NotOwner` redirect
    /// and retrying, up to `MAX_ATTEMPTS` (§4.5, §8 scenario S5).
    async fn route_with_retry(&self, key: &str, request: impl Fn() -> Message) -> Result<Message> {
        let mut owner = self.owner_for(key).await?;
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self.send_once(&owner, request()).await;
            let response = match result {
                Ok(response) => response,
                Err(err) => {
                    self.report_node_down(&owner).await;
                    return Err(err);
                }
            };
            match response {
                Message::NotOwner(payload) => {
                    warn!(%key, attempt, node = %owner, "redirected by NotOwner");
                    let new_ring = payload.to_ring();
                    if new_ring.version > self.ring.read().version {
                        *self.ring.write() = Arc::new(new_ring);
                    } else if attempt > 1 {
                        // The redirect didn't move us forward; force a real
                        // refresh from the master before the last attempt.
                        self.refresh().await?;
                    }
                    owner = match self.ring.read().owner(key.as_bytes()) {
                        Some(id) => id,
                        None => return Err(ClientError::NoOwner),
                    };
                    continue;
                }
                other => return Ok(other),
            }
        }
        Err(ClientError::RetryBudgetExhausted)
    }

    async fn owner_for(&self, key: &str) -> Result<NodeId> {
        if let Some(id) = self.ring.read().owner(key.as_bytes()) {
            return Ok(id);
        }
        self.refresh().await?;
        self.ring.read().owner(key.as_bytes()).ok_or(ClientError::NoOwner)
    }

    async fn send_once(&self, node: &NodeId, message: Message) -> Result<Message> {
        let mut stream = TcpStream::connect((node.host.as_str(), node.port as u16)).await?;
        let (code, payload) = message.encode();
        frame::write_frame(&mut stream, code, &payload).await?;
        let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
        Ok(Message::decode(response.message_type, &response.payload)?)
    }

    /// Advisory `NodeDown` report; failure to reach the master here is not
    /// itself an error worth surfacing (§4.5, §9: "advisory, not
    /// authoritative").
    async fn report_node_down(&self, node: &NodeId) {
        let Ok(mut stream) = TcpStream::connect(&self.master_addr).await else {
            return;
        };
        let (code, payload) = Message::NodeDown {
            host: node.host.clone(),
            port: node.port,
        }
        .encode();
        if frame::write_frame(&mut stream, code, &payload).await.is_ok() {
            info!(node = %node, "reported NodeDown to master");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_client_has_no_owner() {
        let client = Client::new("127.0.0.1:1");
        assert!(client.ring.read().owner(b"x").is_none());
    }
}
