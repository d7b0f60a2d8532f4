//! Build command implementation
//!
//! The build command drives the full pipeline:
//! 1. Load (or regenerate) the board table and filter the selection
//! 2. Resolve the commit series from the branch/count arguments
//! 3. Detect toolchains and compute configuration overrides
//! 4. Run the board x commit matrix on the scheduler's lane pool
//! 5. Aggregate results and derive the exit code
//!
//! `--dry-run` renders the intended actions instead of building;
//! `--summary` re-renders previously persisted results without rebuilding.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;

use build_grid::boards::{self, Boards, Selection};
use build_grid::builder::NativeBuilder;
use build_grid::gitcmd;
use build_grid::output::OutputConfig;
use build_grid::overrides;
use build_grid::report::{self, ReportOptions};
use build_grid::scheduler::{
    effective_jobs, effective_threads, Scheduler, SchedulerOptions,
};
use build_grid::series::{self, Series};
use build_grid::toolchain::Toolchains;
use build_grid::EXIT_OK;

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Board selection terms: target name, architecture, SoC, vendor or label
    pub terms: Vec<String>,

    /// Board terms to exclude (always applied after includes)
    #[arg(short = 'x', long = "exclude", value_name = "TERM", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Build exactly these board targets (narrows the term match)
    #[arg(long, value_name = "TARGET", value_delimiter = ',')]
    pub boards: Vec<String>,

    /// Branch (or commit range) to build; omit to build the current tree
    #[arg(short = 'b', long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Number of most-recent commits to build instead of auto-detection
    #[arg(short = 'c', long, value_name = "COUNT")]
    pub count: Option<usize>,

    /// Number of worker threads (default: min(CPUs, selected boards))
    #[arg(short = 'T', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Parallel compiler tasks inside each native build invocation
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Output root directory (defaults to the parent of the source tree)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Do not create branch/commit subdirectories in the output tree
    #[arg(long)]
    pub no_subdirs: bool,

    /// Build directly in the output directory (one board, one commit only)
    #[arg(short = 'w', long)]
    pub work_in_output: bool,

    /// Rebuild everything, ignoring done-markers
    #[arg(short = 'f', long)]
    pub force_build: bool,

    /// Rebuild only jobs that previously failed
    #[arg(short = 'F', long)]
    pub force_build_failures: bool,

    /// Re-run the configure step even when a configuration exists
    #[arg(long)]
    pub force_reconfig: bool,

    /// Clean each job's output directory before configuring
    #[arg(long)]
    pub mrproper: bool,

    /// Tolerate missing external blobs (downgrades failure to warning)
    #[arg(short = 'M', long)]
    pub allow_missing: bool,

    /// Never tolerate missing external blobs (overrides -M)
    #[arg(long)]
    pub no_allow_missing: bool,

    /// Configuration overrides: KEY=value sets, KEY enables, KEY- disables
    #[arg(short = 'a', long = "adjust-cfg", value_name = "CFG")]
    pub adjust_cfg: Vec<String>,

    /// Adjust the configuration for bit-for-bit reproducible builds
    #[arg(short = 'r', long)]
    pub reproducible: bool,

    /// Show a summary of previously built results without rebuilding
    #[arg(short = 's', long)]
    pub summary: bool,

    /// Show what would be built without building anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Record and display compiled-section sizes per job
    #[arg(long)]
    pub show_sizes: bool,

    /// Do not report warnings in the exit status
    #[arg(short = 'W', long)]
    pub ignore_warnings: bool,

    /// Use this cross-compile prefix for every architecture
    #[arg(long, value_name = "PREFIX")]
    pub toolchain: Option<String>,

    /// Path to the board descriptor table
    #[arg(long, value_name = "FILE", env = "BUILD_GRID_BOARDS")]
    pub board_table: Option<PathBuf>,

    /// Source tree to build from (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub git: Option<PathBuf>,

    /// Explain why each board was selected
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Execute the `build` command, returning the process exit code.
pub fn execute(args: BuildArgs, output: &OutputConfig) -> Result<i32> {
    let src = match &args.git {
        Some(dir) => dir.clone(),
        None => {
            // Prefer the enclosing repository root over the bare cwd.
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            gitcmd::toplevel(&cwd).unwrap_or(cwd)
        }
    };
    if args.work_in_output && args.output.is_none() {
        bail!("--work-in-output requires an explicit --output directory");
    }
    let out_root = absolutize(setup_output_dir(
        args.output.clone(),
        &src,
        args.branch.as_deref(),
        args.no_subdirs,
    ))?;

    let table = load_board_table(&args, &src, &out_root)?;
    let selection = table.select(&args.terms, &args.exclude, explicit_boards(&args))?;
    for warning in &selection.warnings {
        eprintln!("{}", output.warn_line(warning));
    }

    let toolchains = Toolchains::detect().with_override(args.toolchain.clone());
    let series = series::resolve(&src, args.branch.as_deref(), args.count)?;
    let override_set = overrides::compute(&args.adjust_cfg, args.reproducible)?;
    let allow_missing = args.allow_missing && !args.no_allow_missing;

    let threads = effective_threads(args.threads, selection.len());
    let jobs = effective_jobs(args.jobs, selection.len());
    let report_opts = ReportOptions {
        threads,
        jobs,
        verbose: args.verbose,
        show_sizes: args.show_sizes,
    };

    if args.dry_run {
        print!(
            "{}",
            report::show_actions(&selection, series.as_ref(), &out_root, &report_opts)
        );
        return Ok(EXIT_OK);
    }

    let sched_opts = SchedulerOptions {
        out_root: out_root.clone(),
        threads: Some(threads),
        no_subdirs: args.no_subdirs,
        work_in_output: args.work_in_output,
        force_build: args.force_build,
        force_build_failures: args.force_build_failures,
        force_reconfig: args.force_reconfig,
        mrproper: args.mrproper,
        allow_missing,
        collect_sizes: args.show_sizes,
        test_lane_faults: false,
    };
    let builder = NativeBuilder::locate(jobs)?;
    let scheduler = Scheduler::new(sched_opts, src, builder, toolchains, override_set);

    let outcome = if args.summary {
        let (outcome, text) =
            report::show_summary(&scheduler, &selection, series.as_ref(), &report_opts);
        print!("{text}");
        outcome
    } else {
        run_matrix(&scheduler, &selection, series.as_ref(), &report_opts, output)?
    };

    Ok(report::exit_code(&outcome, args.ignore_warnings))
}

fn run_matrix(
    scheduler: &Scheduler,
    selection: &Selection,
    series: Option<&Series>,
    report_opts: &ReportOptions,
    output: &OutputConfig,
) -> Result<build_grid::scheduler::Outcome> {
    println!(
        "{}",
        report::action_summary(false, series.map(Series::len), selection.len(), report_opts)
    );

    let (outcome, results) = scheduler.run(selection, series)?;
    for result in &results {
        use build_grid::builder::JobStatus;
        let line = match result.status {
            JobStatus::Ok => continue,
            JobStatus::Warned => output.warn_line(&format!(
                "{}: built with {} warning(s)",
                result.target, result.warning_count
            )),
            JobStatus::Failed => output.error_line(&format!("{}: FAILED", result.target)),
            JobStatus::Exception => {
                output.error_line(&format!("{}: EXCEPTION: {}", result.target, result.message))
            }
        };
        eprintln!("{line}");
    }
    println!(
        "{} ok, {} warned, {} failed, {} exceptions ({} jobs)",
        outcome.ok,
        outcome.warned,
        outcome.failed,
        outcome.exceptions,
        outcome.total()
    );
    Ok(outcome)
}

/// Output root: user dir or `../grid-out`, plus a branch subdirectory.
fn setup_output_dir(
    output: Option<PathBuf>,
    src: &std::path::Path,
    branch: Option<&str>,
    no_subdirs: bool,
) -> PathBuf {
    let mut root = output.unwrap_or_else(|| src.join("..").join("grid-out"));
    if let Some(branch) = branch {
        if !no_subdirs {
            root.push(branch.replace('/', "_"));
        }
    }
    root
}

/// Anchor a relative output root to the invocation directory.
///
/// The native build runs with the source tree as its working directory, so
/// a relative `O=` would resolve against the source tree while the
/// orchestrator resolves the same path against its own cwd.
fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    Ok(cwd.join(path))
}

fn explicit_boards(args: &BuildArgs) -> Option<&[String]> {
    if args.boards.is_empty() {
        None
    } else {
        Some(&args.boards)
    }
}

/// Load the board table, regenerating it from the source tree if missing.
fn load_board_table(
    args: &BuildArgs,
    src: &std::path::Path,
    out_root: &std::path::Path,
) -> Result<Boards> {
    let table_path = args
        .board_table
        .clone()
        .unwrap_or_else(|| out_root.join("boards.yaml"));
    if !table_path.exists() {
        let threads = args.threads.unwrap_or_else(num_cpus::get);
        boards::ensure_board_list(&table_path, &src.join("configs"), threads, false)
            .with_context(|| format!("cannot generate board table {}", table_path.display()))?;
    }
    Ok(Boards::from_file(&table_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_output_dir_branch_subdir() {
        let root = setup_output_dir(
            Some(PathBuf::from("/tmp/out")),
            std::path::Path::new("/src"),
            Some("feature/widget"),
            false,
        );
        assert_eq!(root, PathBuf::from("/tmp/out/feature_widget"));
    }

    #[test]
    fn test_setup_output_dir_no_subdirs() {
        let root = setup_output_dir(
            Some(PathBuf::from("/tmp/out")),
            std::path::Path::new("/src"),
            Some("topic"),
            true,
        );
        assert_eq!(root, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_setup_output_dir_default_is_sibling() {
        let root = setup_output_dir(None, std::path::Path::new("/src/tree"), None, false);
        assert_eq!(root, PathBuf::from("/src/tree/../grid-out"));
    }

    #[test]
    fn test_absolutize_anchors_relative_paths() {
        let root = absolutize(PathBuf::from("relout")).unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("relout"));

        let abs = absolutize(PathBuf::from("/tmp/out")).unwrap();
        assert_eq!(abs, PathBuf::from("/tmp/out"));
    }
}
