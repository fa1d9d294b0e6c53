//! Process configuration from flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Per-connection read timeout.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-connection write timeout.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// tally-server — HTTP registry of named sample summaries.
#[derive(Parser, Debug)]
#[command(name = "tally-server", version, about)]
pub struct Config {
    /// Path to the JSON backing file.
    #[arg(long, env = "DATA_PATH", default_value = "./data/data.json")]
    pub data_path: PathBuf,

    /// Listen address. A bare ":port" listens on all interfaces.
    #[arg(long, env = "PORT", default_value = ":1234")]
    pub listen: String,
}

impl Config {
    /// Returns the listen address in a form `TcpListener::bind` accepts.
    pub fn listen_addr(&self) -> String {
        match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen.clone(),
        }
    }
}
