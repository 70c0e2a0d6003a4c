//! Migration-target selection (§4.4).
//!
//! LoopCache has no data replication — each key lives on exactly one node,
//! so there is nothing here resembling a replication factor or consistency
//! level. What survives from a replica-placement strategy is the one
//! question the migration engine actually asks: "if this ring changed,
//! which node should now hold this key?" `target_for_key` is that question
//! collapsed to a single answer instead of a ranked list.

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;

/// Picks the node a key should live on for a given ring snapshot.
///
/// A node's migration engine calls this with the newly received ring to
/// decide where to send keys it no longer owns (§4.4).
pub trait MigrationTarget: Send + Sync + 'static {
    fn target_for_key(&self, ring: &RingConfig, key: &[u8]) -> Option<NodeId>;

    fn name(&self) -> &'static str;
}

/// The only strategy LoopCache needs: the key's sole owner under the ring's
/// consistent-hash lookup.
#[derive(Debug, Clone, Default)]
pub struct SingleOwnerTarget;

impl MigrationTarget for SingleOwnerTarget {
    fn target_for_key(&self, ring: &RingConfig, key: &[u8]) -> Option<NodeId> {
        ring.owner(key)
    }

    fn name(&self) -> &'static str {
        "SingleOwnerTarget"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcache_corelib::vnode::DEFAULT_GRANULARITY;

    #[test]
    fn target_matches_ring_owner() {
        let ring = RingConfig::empty()
            .add_node(NodeId::new("10.0.0.1", 11211), DEFAULT_GRANULARITY)
            .unwrap()
            .add_node(NodeId::new("10.0.0.2", 11211), DEFAULT_GRANULARITY)
            .unwrap();
        let strategy = SingleOwnerTarget;
        for key in [b"a" as &[u8], b"b", b"migrated-key"] {
            assert_eq!(strategy.target_for_key(&ring, key), ring.owner(key));
        }
    }

    #[test]
    fn empty_ring_has_no_target() {
        let ring = RingConfig::empty();
        assert_eq!(SingleOwnerTarget.target_for_key(&ring, b"x"), None);
    }
}
