//! # Build-Grid CLI
//!
//! Binary entry point for the `build-grid` command-line tool.
//!
//! Its responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Mapping the aggregate build outcome onto the process exit status
//!   (0 success, 100 failures, 101 warnings, 102 internal exceptions).
//!
//! The core application logic lives in the `build_grid` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
