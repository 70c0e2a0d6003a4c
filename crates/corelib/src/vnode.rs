//! Virtual-node placement (§4.1).
//!
//! A node's virtual-node count scales with its `max_bytes` so capacity-weighted
//! ownership falls out of position density rather than needing a separate
//! weighting scheme — the same idea as the teacher's `VirtualNode::from_index`,
//! generalized from a fixed vnode count to one derived from capacity.

use crate::hash::fnv1a32;
use crate::node::NodeId;

/// Granularity `G`: one virtual node per this many bytes of capacity.
pub const DEFAULT_GRANULARITY: u64 = 1 << 30; // 1 GiB

/// `V = max(1, round(max_bytes / granularity))`.
pub fn virtual_node_count(max_bytes: u64, granularity: u64) -> u32 {
    if granularity == 0 {
        return 1;
    }
    let v = (max_bytes + granularity / 2) / granularity;
    v.max(1).min(u32::MAX as u64) as u32
}

/// Ring position of the `i`-th virtual node for `id`: `hash(host + ":" + port + ":" + i)`.
pub fn position_for(id: &NodeId, i: u32) -> u32 {
    fnv1a32(id.vnode_key(i).as_bytes())
}

/// All ring positions for a node at its current capacity.
pub fn positions_for(id: &NodeId, max_bytes: u64, granularity: u64) -> Vec<u32> {
    let count = virtual_node_count(max_bytes, granularity);
    (0..count).map(|i| position_for(id, i)).collect()
}
