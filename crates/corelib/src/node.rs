//! Node identity and descriptors.
//!
//! A node's identity is its `(host, port)` pair (§3 of the spec); it carries no
//! surrogate numeric id, so the same `(host, port)` always maps back to the same
//! ring positions after a restart or a `Register` re-attach.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a data node: `(host, port)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId {
    pub host: String,
    pub port: u32,
}

impl NodeId {
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The string hashed to place this node's virtual nodes, `"host:port:i"`.
    pub fn vnode_key(&self, i: u32) -> String {
        format!("{}:{}:{}", self.host, self.port, i)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Master-side liveness state (§4.3).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum NodeStatus {
    Up,
    Questionable,
    Down,
}

impl NodeStatus {
    /// Wire encoding for the `status:u8` field (§6.2).
    pub fn to_wire(self) -> u8 {
        match self {
            NodeStatus::Up => 0,
            NodeStatus::Questionable => 1,
            NodeStatus::Down => 2,
        }
    }

    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(NodeStatus::Up),
            1 => Some(NodeStatus::Questionable),
            2 => Some(NodeStatus::Down),
            _ => None,
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Up => "up",
            NodeStatus::Questionable => "questionable",
            NodeStatus::Down => "down",
        };
        write!(f, "{s}")
    }
}

/// A node descriptor as held in the ring configuration (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub max_bytes: u64,
    pub status: NodeStatus,
}

impl NodeDescriptor {
    pub fn new(id: NodeId, max_bytes: u64) -> Self {
        Self {
            id,
            max_bytes,
            status: NodeStatus::Up,
        }
    }
}
