//! Toolchains command implementation
//!
//! Lists the toolchains detected on `PATH`, or prints the single
//! cross-compile prefix shared by a set of boards. The latter fails when
//! the boards span more than one toolchain, since a shared prefix would be
//! meaningless.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use build_grid::boards::Boards;
use build_grid::toolchain::Toolchains;

/// List detected toolchains or print a shared cross-compile prefix
#[derive(Args, Debug)]
pub struct ToolchainsArgs {
    /// Board selection terms, used with --print-prefix
    pub terms: Vec<String>,

    /// Print the CROSS_COMPILE prefix shared by the selected boards
    #[arg(long)]
    pub print_prefix: bool,

    /// Use this cross-compile prefix for every architecture
    #[arg(long, value_name = "PREFIX")]
    pub toolchain: Option<String>,

    /// Path to the board descriptor table
    #[arg(long, value_name = "FILE", env = "BUILD_GRID_BOARDS", default_value = "boards.yaml")]
    pub table: PathBuf,
}

/// Execute the `toolchains` command.
pub fn execute(args: ToolchainsArgs) -> Result<i32> {
    let toolchains = Toolchains::detect().with_override(args.toolchain.clone());

    if args.print_prefix {
        let table = Boards::from_file(&args.table)?;
        let selection = table.select(&args.terms, &[], None)?;
        println!("{}", toolchains.single_prefix(&selection)?);
        return Ok(0);
    }

    let list = toolchains.list();
    if list.is_empty() {
        println!("No cross toolchains detected on PATH");
        return Ok(0);
    }
    for toolchain in list {
        println!("{:<10} {}gcc", toolchain.arch, toolchain.cross_compile);
    }
    Ok(0)
}
