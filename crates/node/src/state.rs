//! Data-node state: local storage engine + cached ring (§3, §4.2).

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;
use loopcache_corelib::storage::{DeleteOutcome, GetOutcome, PutOutcome, Store, StoreStats};
use loopcache_migration::{MigrationTarget, SingleOwnerTarget};
use loopcache_streaming::protocol::ConfigPayload;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

use crate::migration::MigrationJob;

pub struct NodeState {
    pub id: NodeId,
    pub master_addr: String,
    store: Mutex<Store>,
    ring: RwLock<Arc<RingConfig>>,
    migration_tx: Sender<MigrationJob>,
}

impl NodeState {
    pub fn new(id: NodeId, max_bytes: u64, master_addr: String, migration_tx: Sender<MigrationJob>) -> Self {
        Self {
            id,
            master_addr,
            store: Mutex::new(Store::new(max_bytes)),
            ring: RwLock::new(Arc::new(RingConfig::empty())),
            migration_tx,
        }
    }

    pub fn ring(&self) -> Arc<RingConfig> {
        self.ring.read().clone()
    }

    pub fn is_owner(&self, key: &str) -> bool {
        self.ring.read().owner(key.as_bytes()).as_ref() == Some(&self.id)
    }

    pub fn get(&self, key: &str) -> GetOutcome {
        self.store.lock().get(key)
    }

    pub fn put(&self, key: String, value: Vec<u8>) -> PutOutcome {
        self.store.lock().put(key, value)
    }

    pub fn delete(&self, key: &str) -> DeleteOutcome {
        self.store.lock().delete(key)
    }

    pub fn clear(&self) {
        self.store.lock().clear()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.lock().stats()
    }

    /// Apply a ring received from the master (`Register` response or
    /// `ChangeConfig` push), ignoring it if it's not newer (§5: "nodes...
    /// accept only versions strictly greater than their cached version").
    /// Returns `true` if the ring was applied.
    pub fn apply_new_ring(&self, payload: &ConfigPayload) -> bool {
        let next = payload.to_ring();
        {
            let current = self.ring.read();
            if next.version <= current.version {
                return false;
            }
        }
        info!(version = next.version, "applying new ring");
        *self.ring.write() = Arc::new(next.clone());
        self.enqueue_migrations(&next);
        true
    }

    /// Scan local keys for ones this node no longer owns under `new_ring`
    /// and hand them to the migration engine (§4.4).
    fn enqueue_migrations(&self, new_ring: &RingConfig) {
        let keys = self.store.lock().snapshot_keys();
        let strategy = SingleOwnerTarget;
        for key in keys {
            let Some(owner) = strategy.target_for_key(new_ring, key.as_bytes()) else {
                continue;
            };
            if owner == self.id {
                continue;
            }
            let value = match self.store.lock().get(&key) {
                GetOutcome::Hit(v) => v,
                GetOutcome::Miss => continue, // evicted or deleted since the scan
            };
            let job = MigrationJob {
                key,
                value,
                target: owner,
            };
            if let Err(err) = self.migration_tx.try_send(job) {
                warn!(%err, "migration queue full or closed; key stays local until next scan");
            }
        }
    }

    /// Re-fetch the ring from the master (used when a migration-mode `Put`
    /// looks unowned under a possibly-stale cached ring, §4.4).
    pub async fn refresh_from_master(&self) -> anyhow::Result<()> {
        let mut stream = TcpStream::connect(&self.master_addr).await?;
        let (code, payload) = Message::GetConfig.encode();
        frame::write_frame(&mut stream, code, &payload).await?;
        let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
        if let Message::ConfigResponse(payload) = Message::decode(response.message_type, &response.payload)? {
            self.apply_new_ring(&payload);
        }
        Ok(())
    }
}
