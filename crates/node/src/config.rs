//! Data-node startup configuration (§6.3).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "loopcache-node", about = "LoopCache data node")]
pub struct CliArgs {
    /// Address this node advertises to the master and other nodes.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the client/migration listener on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Byte budget for this node's storage engine.
    #[arg(long)]
    pub max_bytes: Option<u64>,

    /// Master's `host:port`.
    #[arg(long)]
    pub master: Option<String>,

    /// Optional JSON config file; flags above override its contents.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub max_bytes: u64,
    pub master: String,
}

impl NodeConfig {
    /// CLI flags override the matching field of an optional config file;
    /// at least one source must supply every field.
    pub fn from_args(args: &CliArgs) -> anyhow::Result<Self> {
        let mut partial: PartialConfig = match &args.config {
            Some(path) => serde_json::from_slice(&std::fs::read(path)?)?,
            None => PartialConfig::default(),
        };
        if let Some(host) = &args.host {
            partial.host = Some(host.clone());
        }
        if let Some(port) = args.port {
            partial.port = Some(port);
        }
        if let Some(max_bytes) = args.max_bytes {
            partial.max_bytes = Some(max_bytes);
        }
        if let Some(master) = &args.master {
            partial.master = Some(master.clone());
        }
        partial.into_config()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PartialConfig {
    host: Option<String>,
    port: Option<u16>,
    max_bytes: Option<u64>,
    master: Option<String>,
}

impl PartialConfig {
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        Ok(NodeConfig {
            host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: self
                .port
                .ok_or_else(|| anyhow::anyhow!("--port is required (flag or config file)"))?,
            max_bytes: self
                .max_bytes
                .ok_or_else(|| anyhow::anyhow!("--max-bytes is required (flag or config file)"))?,
            master: self
                .master
                .ok_or_else(|| anyhow::anyhow!("--master is required (flag or config file)"))?,
        })
    }
}
