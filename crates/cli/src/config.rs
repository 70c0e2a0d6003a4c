//! CLI argument parsing: master address + subcommand (§6.3's admin surface,
//! driven here instead of by the out-of-scope operator GUI).

use crate::commands::Command;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "loopcache-cli", about = "Operator CLI for a LoopCache master")]
pub struct CliConfig {
    /// Master's `host:port`.
    #[arg(long, global = true, default_value = "127.0.0.1:11311")]
    pub master: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub async fn run(&self) -> anyhow::Result<()> {
        self.command.run(&self.master).await
    }
}
