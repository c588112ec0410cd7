//! CLI module for pubmarine
//!
//! Parses `--addr` and `--config`, then runs the broker until Ctrl-C.

mod args;
mod commands;
mod errors;

pub use args::Cli;
pub use commands::{resolve_config, run, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
