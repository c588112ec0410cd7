//! CLI argument definitions using clap
//!
//! - pubmarine
//! - pubmarine --addr 0.0.0.0:10209
//! - pubmarine --config ./pubmarine.json

use clap::Parser;
use std::path::PathBuf;

/// pubmarine - real-time object sync broker
#[derive(Parser, Debug)]
#[command(name = "pubmarine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Listen address as host:port (overrides the config file)
    #[arg(long)]
    pub addr: Option<String>,

    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
