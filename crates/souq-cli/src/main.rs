//! # souq CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// souq — catalog search and count-consistency service.
///
/// Serves the catalog maintenance API with live category count
/// reconciliation, or runs one-shot count synchronization over a fixture.
#[derive(Parser, Debug)]
#[command(name = "souq", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the catalog API with periodic and realtime count reconciliation.
    Serve(souq_cli::serve::ServeArgs),
    /// Run one batch count reconciliation over a fixture and print the report.
    SyncCounts(souq_cli::sync::SyncArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => souq_cli::serve::run(args).await,
        Commands::SyncCounts(args) => souq_cli::sync::run(args).await,
    }
}
