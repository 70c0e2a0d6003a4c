//! Master ring + health state (§4.3).
//!
//! The ring lives behind a `parking_lot::RwLock<Arc<RingConfig>>`: mutators
//! take the write lock, compute a fresh immutable snapshot, and swap the
//! `Arc` in; readers take the read lock just long enough to clone the `Arc`
//! (§9: "publish by atomic pointer swap; readers hold a snapshot reference").

use crate::error::Result;
use crate::health::HealthEntry;
use loopcache_corelib::node::{NodeId, NodeStatus};
use loopcache_corelib::ring::RingConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct MasterState {
    ring: RwLock<Arc<RingConfig>>,
    health: RwLock<HashMap<NodeId, HealthEntry>>,
}

impl MasterState {
    pub fn new() -> Self {
        Self {
            ring: RwLock::new(Arc::new(RingConfig::empty())),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// `GetConfig()` (§4.3).
    pub fn ring(&self) -> Arc<RingConfig> {
        self.ring.read().clone()
    }

    /// `Register(host, port, maxBytes)`: adds the node if unknown (the
    /// Unregistered → Up transition), or just refreshes health if already
    /// present (a heartbeat re-attach, §3 "Lifecycle"). Returns whether this
    /// call actually grew the ring, so the caller knows whether the other
    /// nodes need a `ChangeConfig` push (a first-time Register reshapes the
    /// ring exactly like `AddNode` does; a heartbeat re-attach doesn't).
    pub fn register(&self, id: NodeId, max_bytes: u64) -> Result<(Arc<RingConfig>, bool)> {
        let already_known = self.ring.read().node(&id).is_some();
        if !already_known {
            let mut ring = self.ring.write();
            let next = ring.add_node(id.clone(), max_bytes)?;
            info!(node = %id, version = next.version, "node registered");
            *ring = Arc::new(next);
        }
        self.health
            .write()
            .entry(id)
            .and_modify(|e| e.mark_contacted(Instant::now()))
            .or_insert_with(|| HealthEntry::new_up(Instant::now()));
        Ok((self.ring.read().clone(), !already_known))
    }

    /// `AddNode(host, port, maxBytes)` (§4.3).
    pub fn add_node(&self, id: NodeId, max_bytes: u64) -> Result<Arc<RingConfig>> {
        let mut ring = self.ring.write();
        let next = ring.add_node(id.clone(), max_bytes)?;
        info!(node = %id, version = next.version, "node added");
        *ring = Arc::new(next);
        self.health
            .write()
            .insert(id, HealthEntry::new_up(Instant::now()));
        Ok(ring.clone())
    }

    /// `RemoveNode(host, port)` (§4.3). Drain-before-remove is left to the
    /// caller (operator tooling); this call is the "forcibly" path.
    pub fn remove_node(&self, id: &NodeId) -> Result<Arc<RingConfig>> {
        let mut ring = self.ring.write();
        let next = ring.remove_node(id)?;
        info!(node = %id, version = next.version, "node removed");
        *ring = Arc::new(next);
        self.health.write().remove(id);
        Ok(ring.clone())
    }

    /// `ChangeNode(host, port, newMaxBytes)` (§4.3).
    pub fn change_node(&self, id: &NodeId, new_max_bytes: u64) -> Result<Arc<RingConfig>> {
        let mut ring = self.ring.write();
        let next = ring.change_node(id, new_max_bytes)?;
        info!(node = %id, version = next.version, "node capacity changed");
        *ring = Arc::new(next);
        Ok(ring.clone())
    }

    /// Advisory `NodeDown(node)` report from a client (§4.3, §9): demotes to
    /// Questionable and reflects that into the ring immediately so readers
    /// see it without waiting for the next sweep tick.
    pub fn node_down_reported(&self, id: &NodeId) {
        let status = {
            let mut health = self.health.write();
            let Some(entry) = health.get_mut(id) else {
                return;
            };
            entry.mark_reported_down(Instant::now());
            entry.status
        };
        self.set_ring_status(id, status);
    }

    fn set_ring_status(&self, id: &NodeId, status: NodeStatus) {
        let mut ring = self.ring.write();
        if let Ok(next) = ring.set_status(id, status) {
            *ring = Arc::new(next);
        }
    }

    /// One health-sweep tick: demote any node whose silence has crossed a
    /// threshold, reflecting the new status into the ring (status changes
    /// don't move keys, §4.3's `set_status`).
    pub fn sweep_health(&self) {
        let now = Instant::now();
        let demotions: Vec<(NodeId, NodeStatus)> = {
            let mut health = self.health.write();
            health
                .iter_mut()
                .filter_map(|(id, entry)| entry.sweep(now).map(|status| (id.clone(), status)))
                .collect()
        };
        if demotions.is_empty() {
            return;
        }
        let mut ring = self.ring.write();
        let mut current = (**ring).clone();
        for (id, status) in demotions {
            match current.set_status(&id, status) {
                Ok(next) => {
                    tracing::warn!(node = %id, status = %status, "health sweep demoted node");
                    current = next;
                }
                Err(err) => tracing::warn!(node = %id, %err, "health sweep: node left the ring"),
            }
        }
        *ring = Arc::new(current);
    }

    /// Record a successful probe or heartbeat outside of `Register` (used by
    /// `crate::probe` after a `GetStats` round-trip succeeds): always
    /// promotes back to Up.
    pub fn mark_node_contacted(&self, id: &NodeId) {
        let promoted = {
            let mut health = self.health.write();
            let Some(entry) = health.get_mut(id) else {
                return;
            };
            entry.mark_contacted(Instant::now());
            entry.status
        };
        self.set_ring_status(id, promoted);
    }
}

impl Default for MasterState {
    fn default() -> Self {
        Self::new()
    }
}
