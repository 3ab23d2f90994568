use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use taco_builder::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(cli).await;
    match &result {
        Ok(()) => tracing::info!("taco-builder completed successfully"),
        Err(e) => tracing::error!(error = %format!("{e:#}"), "taco-builder exited with error"),
    }
    result
}
