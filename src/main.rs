//! Main entry point for the regobs-aggregator CLI

use clap::Parser;
use regobs_aggregator::cli::{Cli, Commands, IngestSource};
use regobs_aggregator::shutdown::ShutdownCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("regobs_aggregator=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Install Ctrl+C handler; downloaders stop at the next safe boundary.
    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping at the next safe point...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match &cli.command {
        Commands::Ingest(args) => match &args.source {
            IngestSource::Observations(observations) => observations
                .execute(&cli, shutdown.clone())
                .await
                .map_err(|e| anyhow::anyhow!(e)),
            IngestSource::Warnings(warnings) => warnings
                .execute(&cli, shutdown.clone())
                .await
                .map_err(|e| anyhow::anyhow!(e)),
        },
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        std::process::exit(1);
    }
}
