//! Vidmux CLI - Command-line interface
//!
//! Provides command-line access to the Vidmux download-and-combine service.

mod commands;

use clap::Parser;

#[derive(Parser)]
#[command(name = "vidmux")]
#[command(about = "A media download-and-combine server")]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    commands::handle_command(cli.command).await?;

    Ok(())
}
