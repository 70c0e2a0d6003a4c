//! Distribution scenarios S3 and S4 (§8).

use loopcache_corelib::node::NodeId;
use loopcache_corelib::ring::RingConfig;
use loopcache_corelib::vnode::DEFAULT_GRANULARITY;
use std::collections::HashMap;

fn node(n: u32) -> NodeId {
    NodeId::new(format!("10.0.0.{n}"), 11211)
}

fn distribute(ring: &RingConfig, n: usize) -> HashMap<NodeId, u32> {
    let mut counts = HashMap::new();
    for i in 0..n {
        let key = format!("key-{i}");
        if let Some(owner) = ring.owner(key.as_bytes()) {
            *counts.entry(owner).or_insert(0u32) += 1;
        }
    }
    counts
}

#[test]
fn s3_weighted_nodes_receive_proportional_share() {
    let g = DEFAULT_GRANULARITY;
    let ring = RingConfig::empty()
        .add_node(node(1), g * 32)
        .unwrap()
        .add_node(node(2), g * 32)
        .unwrap()
        .add_node(node(3), g * 64)
        .unwrap();

    let counts = distribute(&ring, 10_000);
    let total = 10_000.0;
    let share = |n: u32| f64::from(*counts.get(&node(n)).unwrap_or(&0)) / total;

    assert!((share(1) - 0.25).abs() < 0.05);
    assert!((share(2) - 0.25).abs() < 0.05);
    assert!((share(3) - 0.50).abs() < 0.05);
}

#[test]
fn s4_adding_a_node_moves_roughly_its_fair_share() {
    let g = DEFAULT_GRANULARITY;
    let before = RingConfig::empty()
        .add_node(node(1), g * 32)
        .unwrap()
        .add_node(node(2), g * 32)
        .unwrap()
        .add_node(node(3), g * 32)
        .unwrap();

    const N: usize = 10_000;
    let keys: Vec<String> = (0..N).map(|i| format!("key-{i}")).collect();
    let owners_before: Vec<_> = keys.iter().map(|k| before.owner(k.as_bytes())).collect();

    let after = before.add_node(node(4), g * 32).unwrap();
    let owners_after: Vec<_> = keys.iter().map(|k| after.owner(k.as_bytes())).collect();

    let moved = owners_before
        .iter()
        .zip(owners_after.iter())
        .filter(|(a, b)| a != b)
        .count();
    let fraction_moved = moved as f64 / N as f64;

    // Adding a 4th equal node should move ~1/4 of keys (the new node's fair share).
    assert!(
        (fraction_moved - 0.25).abs() < 0.05,
        "fraction_moved={fraction_moved}"
    );

    // Every key whose owner didn't change should still resolve to a live node.
    for owner in owners_after.iter().flatten() {
        assert!(after.node(owner).is_some());
    }
}
