//! # CLI Command Implementations
//!
//! One module per subcommand of the `build-grid` command-line tool.
//!
//! Each command module contains an `Args` struct defining its arguments
//! (derived with `clap`) and an `execute` function that performs the
//! command's logic by calling into the `build_grid` library. The `build`
//! command returns the process exit code derived from the aggregate
//! outcome; the others return 0 on success.

pub mod boards;
pub mod build;
pub mod completions;
pub mod toolchains;
