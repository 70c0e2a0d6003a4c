//! Master startup configuration (§6.3).
//!
//! Reading an arbitrary on-disk config format is out of scope; what's here
//! is the struct shape plus CLI flags, matching how a node would be started
//! in a test harness without a config file at all.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Debug, Clone, clap::Parser)]
#[command(name = "loopcache-master", about = "LoopCache master server")]
pub struct CliArgs {
    /// Address to bind the admin/cluster listener on.
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind the admin/cluster listener on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Optional JSON config file; flags above override its contents.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 11311,
        }
    }
}

impl MasterConfig {
    /// Merge an optional config file with CLI flags, CLI flags overriding
    /// only the fields they were actually given. This is JSON-only: the
    /// generic `serde_json` dependency already in the tree, not a bespoke
    /// file format.
    pub fn from_args(args: &CliArgs) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = &args.config {
            let bytes = std::fs::read(path)?;
            serde_json::from_slice(&bytes)?
        } else {
            MasterConfig::default()
        };
        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if let Some(port) = args.port {
            config.port = port;
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
