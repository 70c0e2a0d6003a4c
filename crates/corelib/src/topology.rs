//! Read-only ring inspection (operator/CLI support), adapted from the
//! teacher's `Topology` — same ownership/percentage/describe operations,
//! rebuilt against `RingConfig`'s immutable-snapshot shape instead of a
//! mutable shared `HashRing`.

use crate::node::NodeId;
use crate::ring::RingConfig;
use std::collections::HashMap;

/// A read-only view over a ring snapshot for inspection and monitoring.
pub struct Topology<'a> {
    ring: &'a RingConfig,
}

impl<'a> Topology<'a> {
    pub fn new(ring: &'a RingConfig) -> Self {
        Self { ring }
    }

    /// Tokens owned by each node.
    pub fn ownership(&self) -> HashMap<NodeId, Vec<u32>> {
        let mut ownership: HashMap<NodeId, Vec<u32>> = HashMap::new();
        for entry in &self.ring.entries {
            ownership
                .entry(entry.node.clone())
                .or_default()
                .push(entry.position);
        }
        for positions in ownership.values_mut() {
            positions.sort_unstable();
        }
        ownership
    }

    /// Fraction of ring positions each node owns (0.0-100.0).
    pub fn ownership_percentages(&self) -> HashMap<NodeId, f64> {
        let total = self.ring.entries.len() as f64;
        if total == 0.0 {
            return HashMap::new();
        }
        self.ownership()
            .into_iter()
            .map(|(id, positions)| (id, positions.len() as f64 / total * 100.0))
            .collect()
    }

    /// Human-readable ring summary, used by the `cli` crate's `describe` command.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        out.push_str("Ring Description:\n");
        out.push_str(&format!("  Version: {}\n", self.ring.version));
        out.push_str(&format!("  Nodes: {}\n", self.ring.nodes.len()));
        out.push_str(&format!("  Total Positions: {}\n", self.ring.entries.len()));

        let percentages = self.ownership_percentages();
        if !percentages.is_empty() {
            out.push_str("\nNode Ownership:\n");
            let mut rows: Vec<_> = percentages.iter().collect();
            rows.sort_by(|(a, _), (b, _)| a.cmp(b));
            for (id, pct) in rows {
                let status = self
                    .ring
                    .node(id)
                    .map(|d| d.status.to_string())
                    .unwrap_or_else(|| "unknown".into());
                out.push_str(&format!("  {id} ({status}): {pct:.2}%\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::DEFAULT_GRANULARITY;

    #[test]
    fn ownership_sums_to_total_entries() {
        let ring = RingConfig::empty()
            .add_node(NodeId::new("a", 1), DEFAULT_GRANULARITY)
            .unwrap()
            .add_node(NodeId::new("b", 1), DEFAULT_GRANULARITY)
            .unwrap();
        let topology = Topology::new(&ring);
        let total: usize = topology.ownership().values().map(Vec::len).sum();
        assert_eq!(total, ring.entries.len());
    }

    #[test]
    fn describe_mentions_every_node() {
        let ring = RingConfig::empty()
            .add_node(NodeId::new("a", 1), DEFAULT_GRANULARITY)
            .unwrap();
        let out = Topology::new(&ring).describe();
        assert!(out.contains("a:1"));
    }
}
