//! Attest indexer daemon.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use attestdlib::{config::load_config, indexer::Indexer};

#[derive(Parser, Debug)]
#[command(name = "attestd", about = "The Attest chain event indexer", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .init();

    let args = Args::parse();

    info!("Starting attestd..");

    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from("./attestd/attestd.toml"));

    info!(?config_path, "Using configuration file");

    match Indexer::start(load_config(&config_path)).await {
        Ok(_) => info!("Attest indexer exited cleanly."),
        Err(e) => error!(error = ?e, "Attest indexer failed"),
    }
}
