//! Reelay CLI - Command-line interface
//!
//! Runs the range-aware media streaming server.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "reelay")]
#[command(about = "A range-aware HTTP media streaming server")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await
}
