//! CLI entry point for the LoopCache operator tool.

use clap::Parser;
use loopcache_cli::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    config.run().await
}
