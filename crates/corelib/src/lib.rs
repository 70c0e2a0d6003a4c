//! Shared ring, wire-type, and storage-engine primitives for LoopCache.
//!
//! This crate has no networking and no async runtime — it is the pure logic
//! that `loopcache-master`, `loopcache-node`, and `loopcache-client` all link
//! against so the three processes can never disagree about what `Owner(key)`
//! means for a given ring version (§8 invariant 1).

pub mod error;
pub mod hash;
pub mod node;
pub mod ring;
pub mod storage;
pub mod topology;
pub mod vnode;

pub use error::{Error, Result};
pub use node::{NodeDescriptor, NodeId, NodeStatus};
pub use ring::{RingConfig, RingEntry};
pub use storage::{DeleteOutcome, GetOutcome, PutOutcome, Store, StoreStats};
pub use topology::Topology;
