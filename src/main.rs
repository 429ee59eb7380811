use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use streamwall::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting streamwall v{}", env!("CARGO_PKG_VERSION"));

    // Handle the command
    if let Err(e) = cli.run().await {
        debug!("Command failed: {:?}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
