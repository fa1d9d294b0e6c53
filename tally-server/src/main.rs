//! HTTP front end for the tally sample-summary registry.
//!
//! Loads the backing file once at startup, then serves insert, search,
//! delete, list, and status requests. A backing file that cannot be
//! decoded aborts startup.

mod api;
mod config;

use std::net::TcpListener;
use std::sync::Arc;

use clap::Parser;
use tally::Registry;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    if let Err(e) = run(config) {
        tracing::error!("tally-server failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::open(&config.data_path)?;
    tracing::info!(
        path = %config.data_path.display(),
        entries = registry.status(),
        "backing file loaded"
    );

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr).map_err(|e| format!("bind {addr}: {e}"))?;
    tracing::info!("ready to serve at {addr}");

    api::run_api_server(listener, Arc::new(registry));
    Ok(())
}
