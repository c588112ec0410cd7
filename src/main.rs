//! pubmarine broker entry point
//!
//! Parses arguments and runs the broker via `cli::run`, printing any fatal
//! error to stderr and exiting non-zero.

use pubmarine::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
