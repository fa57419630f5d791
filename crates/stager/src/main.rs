//! NovaHarvest Stager
//!
//! Single-shot staging step for one catalog-query event:
//! 1. Reads the event JSON from a file argument or stdin
//! 2. Snapshots the raw record batch to staging storage
//! 3. Scores and stages harvest candidates into the registry
//! 4. Prints the enriched event for the next state-machine step

mod classify;
mod handler;
mod oa;
mod processor;
mod snapshot;

use novaharvest_common::{config::HarvestConfig, registry::DynamoRegistry, VERSION};
use snapshot::S3SnapshotSink;
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration before logging init; the log level comes from it
    let config = HarvestConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;
    config.validate()?;

    init_tracing(&config);
    info!("Starting NovaHarvest Stager v{}", VERSION);

    let event = read_event()?;

    let registry = DynamoRegistry::from_config(&config.registry).await?;
    let sink = S3SnapshotSink::from_env(&config.staging.bucket).await;

    let out = handler::handle_event(&event, &config, &registry, Some(&sink)).await?;
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(())
}

fn init_tracing(config: &HarvestConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Event source: first CLI argument as a file path, stdin otherwise.
fn read_event() -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw)?)
}
