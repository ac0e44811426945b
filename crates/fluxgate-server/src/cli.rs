//! Command line for the fluxgate server.

use clap::Parser;
use std::path::PathBuf;

/// HTTP proxy that runs SQL queries against InfluxDB 3 and retries
/// transient failures with exponential backoff.
#[derive(Debug, Parser)]
#[command(name = "fluxgate")]
#[command(about = "fluxgate: retrying SQL query proxy for InfluxDB 3", long_about = None)]
pub struct Cli {
    /// Listen address override, e.g. 0.0.0.0:8080 (default: [server].bind).
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Config file path (default: ~/.config/fluxgate/config.toml).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
