//! # Report Aggregator
//!
//! Renders the dry-run preview and the post-hoc summary, and derives the
//! final process exit status from the aggregate outcome. Rendering returns
//! strings so the command layer decides where they go and tests can assert
//! on them directly.

use crate::boards::Selection;
use crate::builder::{JobRecord, JobStatus};
use crate::scheduler::{JobResult, Outcome, Scheduler};
use crate::series::Series;
use crate::{EXIT_EXCEPTIONS, EXIT_FAILURES, EXIT_OK, EXIT_WARNINGS};

/// Display knobs shared by the preview and the summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub threads: usize,
    pub jobs: usize,
    /// List the boards each filter term matched.
    pub verbose: bool,
    pub show_sizes: bool,
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// One-line summary of what a run will do (or did).
pub fn action_summary(
    is_summary: bool,
    commits: Option<usize>,
    boards: usize,
    opts: &ReportOptions,
) -> String {
    let commit_str = match commits {
        Some(n) => format!("{n} commit{}", plural(n)),
        None => "current source".to_string(),
    };
    format!(
        "{} {commit_str} for {boards} board{} ({} thread{}, {} job{} per thread)",
        if is_summary { "Summary of" } else { "Building" },
        plural(boards),
        opts.threads,
        plural(opts.threads),
        opts.jobs,
        plural(opts.jobs),
    )
}

/// Dry-run preview: the intended action set, without executing any job.
pub fn show_actions(
    selection: &Selection,
    series: Option<&Series>,
    out_root: &std::path::Path,
    opts: &ReportOptions,
) -> String {
    let mut out = String::new();
    out.push_str("Dry run, so not doing much. But I would do this:\n\n");
    out.push_str(&action_summary(
        false,
        series.map(Series::len),
        selection.len(),
        opts,
    ));
    out.push('\n');
    out.push_str(&format!("Build directory: {}\n", out_root.display()));

    if let Some(series) = series {
        for commit in &series.commits {
            let short = &commit.hash[..commit.hash.len().min(8)];
            out.push_str(&format!("    {short} {}\n", commit.subject));
        }
    }
    out.push('\n');
    for (term, matched) in &selection.rationale {
        if term == "all" {
            continue;
        }
        out.push_str(&format!("{term}: {} boards\n", matched.len()));
        if opts.verbose {
            out.push_str(&format!("   {}\n", matched.join(" ")));
        }
    }
    out.push_str(&format!(
        "Total boards to build for each commit: {}\n",
        selection.rationale.get("all").map_or(0, Vec::len)
    ));
    for warning in &selection.warnings {
        out.push_str(&format!("{warning}\n"));
    }
    out
}

/// Summary mode: re-read persisted job records without rebuilding.
///
/// Records that are missing (job never ran) are reported as such rather
/// than failing the whole summary.
pub fn show_summary(
    scheduler: &Scheduler,
    selection: &Selection,
    series: Option<&Series>,
    opts: &ReportOptions,
) -> (Outcome, String) {
    let mut out = String::new();
    let mut results = Vec::new();

    out.push_str(&action_summary(
        true,
        series.map(Series::len),
        selection.len(),
        opts,
    ));
    out.push('\n');

    let commits: Vec<Option<&crate::series::Commit>> = match series {
        Some(series) => series.commits.iter().map(Some).collect(),
        None => vec![None],
    };
    for commit in commits {
        if let Some(commit) = commit {
            let short = &commit.hash[..commit.hash.len().min(8)];
            out.push_str(&format!("{:02}: {short} {}\n", commit.sequence, commit.subject));
        }
        for board in selection.boards.values() {
            let dir = scheduler.job_out_dir(board, commit);
            match JobRecord::read(&dir) {
                Ok(record) => {
                    out.push_str(&render_record(&board.target, &record, opts));
                    results.push(record_result(record));
                }
                Err(_) => {
                    out.push_str(&format!("    {:<24} (not built)\n", board.target));
                }
            }
        }
    }
    (Outcome::from_results(&results), out)
}

fn render_record(target: &str, record: &JobRecord, opts: &ReportOptions) -> String {
    let status = match record.status {
        JobStatus::Ok => "OK",
        JobStatus::Warned => "warned",
        JobStatus::Failed => "FAILED",
        JobStatus::Exception => "EXCEPTION",
    };
    let mut line = format!("    {target:<24} {status}");
    if record.warning_count > 0 {
        line.push_str(&format!(" ({} warning{})", record.warning_count, plural(record.warning_count)));
    }
    if opts.show_sizes {
        if let Some(sizes) = record.sizes {
            line.push_str(&format!(
                " text={} data={} bss={} total={}",
                sizes.text,
                sizes.data,
                sizes.bss,
                sizes.total()
            ));
        }
    }
    line.push('\n');
    if !record.message.is_empty() {
        for msg_line in record.message.lines() {
            line.push_str(&format!("        {msg_line}\n"));
        }
    }
    line
}

fn record_result(record: JobRecord) -> JobResult {
    JobResult {
        target: record.target,
        commit_hash: record.commit_hash,
        sequence: record.sequence,
        status: record.status,
        message: record.message,
        warning_count: record.warning_count,
        sizes: record.sizes,
        size_delta: None,
        skipped: true,
    }
}

/// Derive the process exit status; first matching rule wins.
pub fn exit_code(outcome: &Outcome, ignore_warnings: bool) -> i32 {
    if outcome.exceptions > 0 {
        EXIT_EXCEPTIONS
    } else if outcome.failed > 0 {
        EXIT_FAILURES
    } else if outcome.warned > 0 && !ignore_warnings {
        EXIT_WARNINGS
    } else {
        EXIT_OK
    }
}
