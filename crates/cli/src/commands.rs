//! Operator commands, each a thin wrapper around one wire-protocol round
//! trip to the master (§4.3's operations).

use loopcache_corelib::node::NodeStatus;
use loopcache_streaming::{frame, Message, DEFAULT_MAX_PAYLOAD_BYTES};
use tokio::net::TcpStream;

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Print the current ring: version and every node's descriptor.
    GetConfig,
    /// Register a new data node with the ring.
    AddNode {
        host: String,
        port: u32,
        /// Byte budget for the new node.
        max_bytes: u64,
    },
    /// Remove a data node from the ring.
    RemoveNode { host: String, port: u32 },
    /// Change a data node's byte budget, regenerating its ring positions.
    ChangeNode {
        host: String,
        port: u32,
        new_max_bytes: u64,
    },
    /// Fetch a data node's stats by asking the master to forward the request.
    Stats { host: String, port: u32 },
}

pub struct CommandResult(pub String);

impl Command {
    pub async fn run(&self, master_addr: &str) -> anyhow::Result<()> {
        let result = match self {
            Command::GetConfig => get_config(master_addr).await?,
            Command::AddNode { host, port, max_bytes } => {
                simple_request(
                    master_addr,
                    Message::AddNode {
                        host: host.clone(),
                        port: *port,
                        max_bytes: *max_bytes,
                    },
                )
                .await?
            }
            Command::RemoveNode { host, port } => {
                simple_request(
                    master_addr,
                    Message::RemoveNode {
                        host: host.clone(),
                        port: *port,
                    },
                )
                .await?
            }
            Command::ChangeNode { host, port, new_max_bytes } => {
                simple_request(
                    master_addr,
                    Message::ChangeNode {
                        host: host.clone(),
                        port: *port,
                        new_max_bytes: *new_max_bytes,
                    },
                )
                .await?
            }
            Command::Stats { host, port } => {
                simple_request(
                    master_addr,
                    Message::GetStats {
                        target: Some((host.clone(), *port)),
                    },
                )
                .await?
            }
        };
        println!("{}", result.0);
        Ok(())
    }
}

async fn roundtrip(master_addr: &str, request: Message) -> anyhow::Result<Message> {
    let mut stream = TcpStream::connect(master_addr).await?;
    let (code, payload) = request.encode();
    frame::write_frame(&mut stream, code, &payload).await?;
    let response = frame::read_frame(&mut stream, DEFAULT_MAX_PAYLOAD_BYTES).await?;
    Ok(Message::decode(response.message_type, &response.payload)?)
}

async fn get_config(master_addr: &str) -> anyhow::Result<CommandResult> {
    match roundtrip(master_addr, Message::GetConfig).await? {
        Message::ConfigResponse(config) => {
            let mut out = format!("version {}\n", config.version);
            for node in &config.nodes {
                let status = NodeStatus::from_wire(node.status)
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| format!("unknown({})", node.status));
                out.push_str(&format!(
                    "  {}:{}  max_bytes={}  status={}  vnodes={}\n",
                    node.host,
                    node.port,
                    node.max_bytes,
                    status,
                    node.positions.len()
                ));
            }
            Ok(CommandResult(out))
        }
        other => anyhow::bail!("master returned unexpected response: {other:?}"),
    }
}

async fn simple_request(master_addr: &str, request: Message) -> anyhow::Result<CommandResult> {
    match roundtrip(master_addr, request).await? {
        Message::Ok => Ok(CommandResult("ok".to_string())),
        Message::StatsResponse {
            max_bytes,
            used_bytes,
            num_objects,
            version,
            status,
        } => {
            let status = NodeStatus::from_wire(status)
                .map(|s| format!("{s:?}"))
                .unwrap_or_else(|| format!("unknown({status})"));
            Ok(CommandResult(format!(
                "max_bytes={max_bytes} used_bytes={used_bytes} num_objects={num_objects} version={version} status={status}"
            )))
        }
        Message::Error(message) => anyhow::bail!("master error: {message}"),
        other => anyhow::bail!("master returned unexpected response: {other:?}"),
    }
}
