use crate::error::CliError;
use clap::Parser;
use commands::Commands;
use tracing::Level;

mod commands;
mod demo;
mod error;

#[derive(Parser)]
#[command(name = "tailfeed", version = "0.1.0", about = "Change-feed cursor demo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // Initialize logger
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            partitions,
            durable,
            pause_ms,
        } => demo::run(partitions, durable, pause_ms).await?,
    }

    Ok(())
}
