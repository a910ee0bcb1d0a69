//! src/main.rs
//!
//! Binary entry point. Responsible for initializing tracing, loading
//! configuration, applying CLI overrides, instantiating the main `App`,
//! and running it.

use anyhow::Context;
use clap::Parser;
use overlay_node::{App, Config};
use std::net::SocketAddr;

/// A peer-to-peer overlay node for the ad-view-counting network.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// This node's identifier.
    #[arg(long = "id")]
    node_id: String,

    /// Address to bind the UDP transport to.
    #[arg(long)]
    endpoint: Option<String>,

    /// Bootstrap peer endpoints to HELLO on startup.
    #[arg(long, num_args = 0..)]
    bootstrap: Vec<String>,

    /// Enable the local status/observability HTTP+WS surface.
    #[arg(long)]
    status_addr: Option<SocketAddr>,

    /// Verbose logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    let mut config = Config::load().context("failed to load configuration")?;
    config.node_id = cli.node_id;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if !cli.bootstrap.is_empty() {
        config.bootstrap_peers = cli.bootstrap;
    }
    if let Some(status_addr) = cli.status_addr {
        config.status_addr = Some(status_addr);
    }

    if let Err(e) = App::new(config)?.run().await {
        tracing::error!(error = %e, "application failed");
        std::process::exit(1);
    }

    Ok(())
}
