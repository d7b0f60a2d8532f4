//! Boards command implementation
//!
//! Lists the board descriptor table, optionally regenerating it from the
//! board source tree first. Regeneration scans `*_defconfig` files with a
//! bounded worker count.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use build_grid::boards::{self, Boards};

/// List or regenerate the board descriptor table
#[derive(Args, Debug)]
pub struct BoardsArgs {
    /// Path to the board descriptor table
    #[arg(long, value_name = "FILE", env = "BUILD_GRID_BOARDS", default_value = "boards.yaml")]
    pub table: PathBuf,

    /// Regenerate the table even if it exists
    #[arg(long)]
    pub regen: bool,

    /// Board source tree to scan for defconfig files
    #[arg(long, value_name = "DIR", default_value = "configs")]
    pub src: PathBuf,

    /// Number of scanner threads
    #[arg(short = 'T', long, value_name = "N")]
    pub threads: Option<usize>,
}

/// Execute the `boards` command.
pub fn execute(args: BoardsArgs) -> Result<i32> {
    let threads = args.threads.unwrap_or_else(num_cpus::get);
    if args.regen || !args.table.exists() {
        boards::ensure_board_list(&args.table, &args.src, threads, args.regen)
            .with_context(|| format!("cannot generate board table {}", args.table.display()))?;
    }

    let table = Boards::from_file(&args.table)?;
    let all = table.select(&[], &[], None)?;
    println!("{:<28} {:<10} {:<12} {}", "Target", "Arch", "SoC", "Vendor");
    for board in all.boards.values() {
        println!(
            "{:<28} {:<10} {:<12} {}",
            board.target, board.arch, board.soc, board.vendor
        );
    }
    println!("{} boards", table.len());
    Ok(0)
}
