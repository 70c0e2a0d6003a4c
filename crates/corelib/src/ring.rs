//! The consistent-hash ring configuration (§3, §4.1).
//!
//! `RingConfig` is an immutable snapshot: mutation methods take `&self` and
//! return a new, version-bumped `RingConfig` rather than mutating in place.
//! This is the "ring as immutable snapshot + version" design note from §9 —
//! the master publishes a new snapshot by swapping an `Arc<RingConfig>` behind
//! its writer lock (see `loopcache-master::state`), so readers never observe a
//! torn ring.

use crate::error::{Error, Result};
use crate::hash::fnv1a32;
use crate::node::{NodeDescriptor, NodeId, NodeStatus};
use crate::vnode::{self, DEFAULT_GRANULARITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single virtual-node position on the ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingEntry {
    pub position: u32,
    pub node: NodeId,
    pub vnode_index: u32,
}

/// Authoritative ring snapshot: a monotonic version, the node table, and the
/// sorted ring entries (§3 invariants: positions unique, every position maps
/// to a live descriptor, version strictly increases on every mutation).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RingConfig {
    pub version: u32,
    pub nodes: BTreeMap<NodeId, NodeDescriptor>,
    pub entries: Vec<RingEntry>,
}

impl RingConfig {
    /// The empty ring at version 0.
    pub fn empty() -> Self {
        Self {
            version: 0,
            nodes: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    /// `Owner(key)`: first entry with position ≥ hash(key), wrapping to the
    /// lowest entry if none. Ties on position are broken by entry sort order,
    /// which is `(position, host, port, vnode_index)` — see `rebuild_entries`.
    pub fn owner(&self, key: &[u8]) -> Option<NodeId> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = fnv1a32(key);
        match self.entries.binary_search_by_key(&hash, |e| e.position) {
            Ok(idx) => Some(self.entries[idx].node.clone()),
            Err(idx) => {
                let idx = if idx == self.entries.len() { 0 } else { idx };
                Some(self.entries[idx].node.clone())
            }
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    /// `AddNode(host, port, maxBytes)` — bumps version, generates positions.
    /// Errors if the node is already present (use `change_node` instead).
    pub fn add_node(&self, id: NodeId, max_bytes: u64) -> Result<Self> {
        if self.nodes.contains_key(&id) {
            return Err(Error::InvalidNode(format!("{id} already registered")));
        }
        let mut nodes = self.nodes.clone();
        nodes.insert(id.clone(), NodeDescriptor::new(id, max_bytes));
        Ok(self.with_nodes(nodes))
    }

    /// `RemoveNode(host, port)`.
    pub fn remove_node(&self, id: &NodeId) -> Result<Self> {
        if !self.nodes.contains_key(id) {
            return Err(Error::UnknownNode(id.to_string()));
        }
        let mut nodes = self.nodes.clone();
        nodes.remove(id);
        Ok(self.with_nodes(nodes))
    }

    /// `ChangeNode(host, port, newMaxBytes)` — regenerates positions.
    pub fn change_node(&self, id: &NodeId, new_max_bytes: u64) -> Result<Self> {
        let mut nodes = self.nodes.clone();
        let descriptor = nodes
            .get_mut(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        descriptor.max_bytes = new_max_bytes;
        Ok(self.with_nodes(nodes))
    }

    /// Update a node's master-observed status without touching the ring
    /// shape (Up/Questionable/Down transitions don't move keys).
    pub fn set_status(&self, id: &NodeId, status: NodeStatus) -> Result<Self> {
        let mut nodes = self.nodes.clone();
        let descriptor = nodes
            .get_mut(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?;
        if descriptor.status == status {
            return Ok(self.clone());
        }
        descriptor.status = status;
        Ok(Self {
            version: self.version + 1,
            entries: self.entries.clone(),
            nodes,
        })
    }

    fn with_nodes(&self, nodes: BTreeMap<NodeId, NodeDescriptor>) -> Self {
        let entries = rebuild_entries(&nodes);
        Self {
            version: self.version + 1,
            nodes,
            entries,
        }
    }
}

/// Recompute every node's virtual-node positions and sort them for binary
/// search + deterministic tie-breaking.
fn rebuild_entries(nodes: &BTreeMap<NodeId, NodeDescriptor>) -> Vec<RingEntry> {
    let mut entries = Vec::new();
    for descriptor in nodes.values() {
        for (i, position) in
            vnode::positions_for(&descriptor.id, descriptor.max_bytes, DEFAULT_GRANULARITY)
                .into_iter()
                .enumerate()
        {
            entries.push(RingEntry {
                position,
                node: descriptor.id.clone(),
                vnode_index: i as u32,
            });
        }
    }
    entries.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.node.cmp(&b.node))
            .then_with(|| a.vnode_index.cmp(&b.vnode_index))
    });
    entries
}
