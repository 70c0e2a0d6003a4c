//! Message types and payloads (§6.2).

use crate::error::{Result, StreamingError};
use crate::frame::{PayloadReader, PayloadWriter};
use loopcache_corelib::node::{NodeDescriptor, NodeId, NodeStatus};
use loopcache_corelib::ring::{RingConfig, RingEntry};
use std::collections::BTreeMap;

/// Stable numeric codes from the wire-format table (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    GetConfig = 1,
    ConfigResponse = 2,
    AddNode = 3,
    RemoveNode = 4,
    ChangeNode = 5,
    NodeDown = 6,
    Register = 7,
    GetStats = 8,
    StatsResponse = 9,
    PutObject = 10,
    GetObject = 11,
    DeleteObject = 12,
    ObjectValue = 13,
    ChangeConfig = 14,
    Ok = 15,
    Miss = 16,
    NotOwner = 17,
    OutOfRoom = 18,
    Error = 19,
    Clear = 20,
}

impl MessageType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            1 => MessageType::GetConfig,
            2 => MessageType::ConfigResponse,
            3 => MessageType::AddNode,
            4 => MessageType::RemoveNode,
            5 => MessageType::ChangeNode,
            6 => MessageType::NodeDown,
            7 => MessageType::Register,
            8 => MessageType::GetStats,
            9 => MessageType::StatsResponse,
            10 => MessageType::PutObject,
            11 => MessageType::GetObject,
            12 => MessageType::DeleteObject,
            13 => MessageType::ObjectValue,
            14 => MessageType::ChangeConfig,
            15 => MessageType::Ok,
            16 => MessageType::Miss,
            17 => MessageType::NotOwner,
            18 => MessageType::OutOfRoom,
            19 => MessageType::Error,
            20 => MessageType::Clear,
            other => return Err(StreamingError::UnknownMessageType(other)),
        })
    }
}

/// One node entry inside a `ConfigPayload` (§6.2's `ConfigResponse`/`ChangeConfig` row).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub host: String,
    pub port: u32,
    pub max_bytes: u64,
    pub status: u8,
    pub positions: Vec<u32>,
}

/// `version:u32, nodeCount:u32, then per node: ...` — shared by `ConfigResponse`,
/// `ChangeConfig`, and the config embedded in `NotOwner`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigPayload {
    pub version: u32,
    pub nodes: Vec<NodeInfo>,
}

impl ConfigPayload {
    pub fn from_ring(ring: &RingConfig) -> Self {
        let nodes = ring
            .nodes
            .values()
            .map(|d| {
                let mut positions: Vec<(u32, u32)> = ring
                    .entries
                    .iter()
                    .filter(|e| e.node == d.id)
                    .map(|e| (e.vnode_index, e.position))
                    .collect();
                positions.sort_by_key(|(i, _)| *i);
                NodeInfo {
                    host: d.id.host.clone(),
                    port: d.id.port,
                    max_bytes: d.max_bytes,
                    status: d.status.to_wire(),
                    positions: positions.into_iter().map(|(_, p)| p).collect(),
                }
            })
            .collect();
        Self {
            version: ring.version,
            nodes,
        }
    }

    /// Reconstruct a ring snapshot verbatim from what the master published —
    /// receivers adopt the transmitted positions rather than recomputing them,
    /// so everyone agrees even if the placement algorithm ever changes.
    pub fn to_ring(&self) -> RingConfig {
        let mut nodes = BTreeMap::new();
        let mut entries = Vec::new();
        for n in &self.nodes {
            let id = NodeId::new(n.host.clone(), n.port);
            let status = NodeStatus::from_wire(n.status).unwrap_or(NodeStatus::Up);
            nodes.insert(
                id.clone(),
                NodeDescriptor {
                    id: id.clone(),
                    max_bytes: n.max_bytes,
                    status,
                },
            );
            for (i, position) in n.positions.iter().enumerate() {
                entries.push(RingEntry {
                    position: *position,
                    node: id.clone(),
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
        RingConfig {
            version: self.version,
            nodes,
            entries,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = PayloadWriter::new();
        w.put_u32(self.version).put_u32(self.nodes.len() as u32);
        for n in &self.nodes {
            w.put_string(&n.host)
                .put_u32(n.port)
                .put_u64(n.max_bytes)
                .put_u8(n.status)
                .put_u32(n.positions.len() as u32);
            for p in &n.positions {
                w.put_u32(*p);
            }
        }
        w.into_vec()
    }

    pub fn decode(r: &mut PayloadReader<'_>) -> Result<Self> {
        let version = r.u32()?;
        let node_count = r.u32()?;
        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let host = r.string()?;
            let port = r.u32()?;
            let max_bytes = r.u64()?;
            let status = r.u8()?;
            let pos_count = r.u32()?;
            let mut positions = Vec::with_capacity(pos_count as usize);
            for _ in 0..pos_count {
                positions.push(r.u32()?);
            }
            nodes.push(NodeInfo {
                host,
                port,
                max_bytes,
                status,
                positions,
            });
        }
        Ok(Self { version, nodes })
    }
}

/// Flag bit on `PutObject` marking a migration-mode write (§4.4).
pub const PUT_FLAG_MIGRATION: u8 = 1 << 0;

/// A fully decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GetConfig,
    ConfigResponse(ConfigPayload),
    AddNode { host: String, port: u32, max_bytes: u64 },
    RemoveNode { host: String, port: u32 },
    ChangeNode { host: String, port: u32, new_max_bytes: u64 },
    NodeDown { host: String, port: u32 },
    Register { host: String, port: u32, max_bytes: u64 },
    GetStats { target: Option<(String, u32)> },
    StatsResponse { max_bytes: u64, used_bytes: u64, num_objects: u64, version: u32, status: u8 },
    PutObject { key: String, value: Vec<u8>, flags: u8 },
    GetObject { key: String },
    DeleteObject { key: String },
    ObjectValue { value: Vec<u8> },
    ChangeConfig(ConfigPayload),
    Ok,
    Miss,
    NotOwner(ConfigPayload),
    OutOfRoom,
    Error(String),
    Clear,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::GetConfig => MessageType::GetConfig,
            Message::ConfigResponse(_) => MessageType::ConfigResponse,
            Message::AddNode { .. } => MessageType::AddNode,
            Message::RemoveNode { .. } => MessageType::RemoveNode,
            Message::ChangeNode { .. } => MessageType::ChangeNode,
            Message::NodeDown { .. } => MessageType::NodeDown,
            Message::Register { .. } => MessageType::Register,
            Message::GetStats { .. } => MessageType::GetStats,
            Message::StatsResponse { .. } => MessageType::StatsResponse,
            Message::PutObject { .. } => MessageType::PutObject,
            Message::GetObject { .. } => MessageType::GetObject,
            Message::DeleteObject { .. } => MessageType::DeleteObject,
            Message::ObjectValue { .. } => MessageType::ObjectValue,
            Message::ChangeConfig(_) => MessageType::ChangeConfig,
            Message::Ok => MessageType::Ok,
            Message::Miss => MessageType::Miss,
            Message::NotOwner(_) => MessageType::NotOwner,
            Message::OutOfRoom => MessageType::OutOfRoom,
            Message::Error(_) => MessageType::Error,
            Message::Clear => MessageType::Clear,
        }
    }

    /// Encode to `(message_type_code, payload_bytes)` for `frame::write_frame`.
    pub fn encode(&self) -> (u8, Vec<u8>) {
        let code = self.message_type().code();
        let payload = match self {
            Message::GetConfig | Message::Ok | Message::Miss | Message::OutOfRoom | Message::Clear => {
                Vec::new()
            }
            Message::ConfigResponse(c) | Message::ChangeConfig(c) | Message::NotOwner(c) => {
                c.encode()
            }
            Message::AddNode { host, port, max_bytes } => {
                let mut w = PayloadWriter::new();
                w.put_string(host).put_u32(*port).put_u64(*max_bytes);
                w.into_vec()
            }
            Message::RemoveNode { host, port } | Message::NodeDown { host, port } => {
                let mut w = PayloadWriter::new();
                w.put_string(host).put_u32(*port);
                w.into_vec()
            }
            Message::ChangeNode { host, port, new_max_bytes } => {
                let mut w = PayloadWriter::new();
                w.put_string(host).put_u32(*port).put_u64(*new_max_bytes);
                w.into_vec()
            }
            Message::Register { host, port, max_bytes } => {
                let mut w = PayloadWriter::new();
                w.put_string(host).put_u32(*port).put_u64(*max_bytes);
                w.into_vec()
            }
            Message::GetStats { target } => {
                let mut w = PayloadWriter::new();
                if let Some((host, port)) = target {
                    w.put_string(host).put_u32(*port);
                }
                w.into_vec()
            }
            Message::StatsResponse { max_bytes, used_bytes, num_objects, version, status } => {
                let mut w = PayloadWriter::new();
                w.put_u64(*max_bytes)
                    .put_u64(*used_bytes)
                    .put_u64(*num_objects)
                    .put_u32(*version)
                    .put_u8(*status);
                w.into_vec()
            }
            Message::PutObject { key, value, flags } => {
                let mut w = PayloadWriter::new();
                w.put_string(key).put_bytes(value).put_u8(*flags);
                w.into_vec()
            }
            Message::GetObject { key } | Message::DeleteObject { key } => {
                let mut w = PayloadWriter::new();
                w.put_string(key);
                w.into_vec()
            }
            Message::ObjectValue { value } => {
                let mut w = PayloadWriter::new();
                w.put_bytes(value);
                w.into_vec()
            }
            Message::Error(message) => {
                let mut w = PayloadWriter::new();
                w.put_string(message);
                w.into_vec()
            }
        };
        (code, payload)
    }

    /// Decode a message body given its type code and raw payload bytes.
    pub fn decode(message_type: u8, payload: &[u8]) -> Result<Self> {
        let mt = MessageType::from_code(message_type)?;
        let mut r = PayloadReader::new(payload);
        let message = match mt {
            MessageType::GetConfig => Message::GetConfig,
            MessageType::ConfigResponse => Message::ConfigResponse(ConfigPayload::decode(&mut r)?),
            MessageType::ChangeConfig => Message::ChangeConfig(ConfigPayload::decode(&mut r)?),
            MessageType::NotOwner => Message::NotOwner(ConfigPayload::decode(&mut r)?),
            MessageType::AddNode => Message::AddNode {
                host: r.string()?,
                port: r.u32()?,
                max_bytes: r.u64()?,
            },
            MessageType::RemoveNode => Message::RemoveNode {
                host: r.string()?,
                port: r.u32()?,
            },
            MessageType::NodeDown => Message::NodeDown {
                host: r.string()?,
                port: r.u32()?,
            },
            MessageType::ChangeNode => Message::ChangeNode {
                host: r.string()?,
                port: r.u32()?,
                new_max_bytes: r.u64()?,
            },
            MessageType::Register => Message::Register {
                host: r.string()?,
                port: r.u32()?,
                max_bytes: r.u64()?,
            },
            MessageType::GetStats => {
                let target = if r.is_empty() {
                    None
                } else {
                    Some((r.string()?, r.u32()?))
                };
                Message::GetStats { target }
            }
            MessageType::StatsResponse => Message::StatsResponse {
                max_bytes: r.u64()?,
                used_bytes: r.u64()?,
                num_objects: r.u64()?,
                version: r.u32()?,
                status: r.u8()?,
            },
            MessageType::PutObject => Message::PutObject {
                key: r.string()?,
                value: r.bytes()?,
                flags: r.u8()?,
            },
            MessageType::GetObject => Message::GetObject { key: r.string()? },
            MessageType::DeleteObject => Message::DeleteObject { key: r.string()? },
            MessageType::ObjectValue => Message::ObjectValue { value: r.bytes()? },
            MessageType::Ok => Message::Ok,
            MessageType::Miss => Message::Miss,
            MessageType::OutOfRoom => Message::OutOfRoom,
            MessageType::Error => Message::Error(r.string()?),
            MessageType::Clear => Message::Clear,
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcache_corelib::node::NodeId;
    use loopcache_corelib::ring::RingConfig;
    use loopcache_corelib::vnode::DEFAULT_GRANULARITY;

    fn sample_ring() -> RingConfig {
        RingConfig::empty()
            .add_node(NodeId::new("10.0.0.1", 11211), DEFAULT_GRANULARITY)
            .unwrap()
            .add_node(NodeId::new("10.0.0.2", 11211), DEFAULT_GRANULARITY * 2)
            .unwrap()
    }

    fn round_trip(msg: Message) {
        let (code, payload) = msg.encode();
        let decoded = Message::decode(code, &payload).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn round_trips_every_message_variant() {
        round_trip(Message::GetConfig);
        round_trip(Message::Ok);
        round_trip(Message::Miss);
        round_trip(Message::OutOfRoom);
        round_trip(Message::Clear);
        round_trip(Message::Error("boom".into()));
        round_trip(Message::AddNode {
            host: "10.0.0.1".into(),
            port: 11211,
            max_bytes: 1 << 30,
        });
        round_trip(Message::RemoveNode {
            host: "10.0.0.1".into(),
            port: 11211,
        });
        round_trip(Message::ChangeNode {
            host: "10.0.0.1".into(),
            port: 11211,
            new_max_bytes: 1 << 31,
        });
        round_trip(Message::NodeDown {
            host: "10.0.0.1".into(),
            port: 11211,
        });
        round_trip(Message::Register {
            host: "10.0.0.1".into(),
            port: 11211,
            max_bytes: 1 << 30,
        });
        round_trip(Message::GetStats { target: None });
        round_trip(Message::GetStats {
            target: Some(("10.0.0.1".into(), 11211)),
        });
        round_trip(Message::StatsResponse {
            max_bytes: 100,
            used_bytes: 40,
            num_objects: 2,
            version: 3,
            status: 0,
        });
        round_trip(Message::PutObject {
            key: "k".into(),
            value: vec![1, 2, 3],
            flags: PUT_FLAG_MIGRATION,
        });
        round_trip(Message::GetObject { key: "k".into() });
        round_trip(Message::DeleteObject { key: "k".into() });
        round_trip(Message::ObjectValue {
            value: vec![1, 2, 3],
        });

        let ring = sample_ring();
        let config = ConfigPayload::from_ring(&ring);
        round_trip(Message::ConfigResponse(config.clone()));
        round_trip(Message::ChangeConfig(config.clone()));
        round_trip(Message::NotOwner(config));
    }

    #[test]
    fn config_payload_round_trips_through_ring_config() {
        let ring = sample_ring();
        let payload = ConfigPayload::from_ring(&ring);
        let rebuilt = payload.to_ring();
        assert_eq!(rebuilt.version, ring.version);
        assert_eq!(rebuilt.entries.len(), ring.entries.len());
        for key in ["a", "b", "some-long-key"] {
            assert_eq!(rebuilt.owner(key.as_bytes()), ring.owner(key.as_bytes()));
        }
    }

    #[test]
    fn unknown_message_type_is_an_error() {
        assert!(Message::decode(200, &[]).is_err());
    }
}
