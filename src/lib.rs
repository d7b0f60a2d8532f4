//! # Build-Grid Library
//!
//! Core functionality for the `build-grid` command-line tool: a build-matrix
//! orchestrator that compiles a cross product of {hardware targets} x
//! {source commits} against architecture-specific cross toolchains, bounded
//! by the host's CPU resources, and reduces the per-job results to a single
//! exit status.
//!
//! ## Core Concepts
//!
//! - **Board Registry (`boards`)**: loads the board descriptor table and
//!   filters it with include/exclude terms and explicit target lists.
//! - **Series Resolver (`series`)**: derives the ordered commit list from a
//!   branch or range, prepending the upstream baseline as a control commit.
//! - **Toolchain Registry (`toolchain`)**: maps architecture to
//!   cross-compiler prefix and its environment projection.
//! - **Config Adjuster (`overrides`)**: computes the configuration-key
//!   override set applied identically to every job.
//! - **Build Scheduler (`scheduler`)**: the concurrent core. Worker lanes
//!   with exclusive working-tree checkouts walk the series in sequence
//!   order and collect exactly one result per (board, commit) job.
//! - **Report Aggregator (`report`)**: dry-run previews, summaries of
//!   persisted results, and exit-status derivation.
//!
//! ## Execution Flow
//!
//! 1. Load and filter boards; warn on unmatched terms, fail when empty.
//! 2. Resolve the series (or build the current tree when no branch).
//! 3. Detect toolchains; compute overrides.
//! 4. Run the matrix on the scheduler's lane pool.
//! 5. Aggregate results into an `Outcome` and derive the exit status.
//!
//! ## Quick Example
//!
//! ```
//! use build_grid::boards::{Board, Boards};
//!
//! let table = Boards::new(vec![Board {
//!     target: "qemu_arm64".to_string(),
//!     arch: "arm".to_string(),
//!     soc: "qemu".to_string(),
//!     vendor: "emulation".to_string(),
//!     labels: Default::default(),
//! }]);
//!
//! let selection = table.select(&["arm".to_string()], &[], None).unwrap();
//! assert_eq!(selection.len(), 1);
//! assert_eq!(selection.rationale["arm"], vec!["qemu_arm64"]);
//! ```

pub mod boards;
pub mod builder;
pub mod error;
pub mod gitcmd;
pub mod output;
pub mod overrides;
pub mod report;
pub mod scheduler;
pub mod series;
pub mod toolchain;

/// Every submitted job succeeded (or warnings were ignored).
pub const EXIT_OK: i32 = 0;
/// At least one job failed to build.
pub const EXIT_FAILURES: i32 = 100;
/// At least one job built with warnings and warnings are not ignored.
pub const EXIT_WARNINGS: i32 = 101;
/// The orchestration itself faulted somewhere; highest severity because it
/// indicates an environment or tooling defect, not a source problem.
pub const EXIT_EXCEPTIONS: i32 = 102;
