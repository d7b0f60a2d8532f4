//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Build-Grid - build a matrix of boards x commits with cross toolchains
#[derive(Parser, Debug)]
#[command(name = "build-grid")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the selected boards across the resolved commit series
    Build(commands::build::BuildArgs),

    /// List the board table or regenerate it from a source tree
    Boards(commands::boards::BoardsArgs),

    /// List detected toolchains or print a shared cross-compile prefix
    Toolchains(commands::toolchains::ToolchainsArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code.
    pub fn execute(self) -> Result<i32> {
        env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .init();
        let output = build_grid::output::OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Build(args) => commands::build::execute(args, &output),
            Commands::Boards(args) => commands::boards::execute(args),
            Commands::Toolchains(args) => commands::toolchains::execute(args),
            Commands::Completions(args) => {
                commands::completions::execute(args)?;
                Ok(0)
            }
        }
    }
}
