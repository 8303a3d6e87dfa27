use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use feedly_sync::config;
use feedly_sync::feedly::FeedlyClient;
use reqwest::Method;

#[derive(Parser, Debug)]
#[command(about = "Print the raw JSON Feedly returns for a GET endpoint")]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Endpoint relative to the API base, e.g. `markers/tags` or
    /// `annotations/journal?count=5`
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let client = FeedlyClient::from_config(&cfg)?;

    let value = client
        .call(&args.path, Method::GET, None)
        .await
        .with_context(|| format!("GET {} failed", args.path))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
