//! # Build Scheduler
//!
//! Executes the full job matrix {selected boards} x {series commits, or one
//! pseudo-commit when there is no series} on a fixed pool of OS-thread
//! worker lanes, collecting exactly one result per job.
//!
//! ## Concurrency model
//!
//! Boards are dealt round-robin onto `threads` lanes. Each lane owns a
//! private working-tree clone, created on the first job that needs a
//! checkout so a fully-skipped rerun clones nothing, and walks the series
//! in non-decreasing sequence order, checking out each commit once and
//! building every board assigned to the lane before advancing. Lanes never
//! share a working tree, because checkout mutates shared files. The
//! per-lane ordering also keeps size-delta comparisons well defined; no
//! ordering is guaranteed across lanes.
//!
//! The shared result table is append-only behind a mutex with one writer
//! per completed job, and is not read until every lane has joined. There is
//! no mid-run cancellation: every submitted job runs to completion so one
//! invocation yields the maximum information. A fault inside a lane is
//! caught at the lane boundary and recorded as an `Exception` result; it
//! never aborts sibling lanes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use log::{debug, info};

use crate::boards::{Board, Selection};
use crate::builder::{classify, BuildRequest, JobRecord, JobStatus, NativeBuilder, SectionSizes};
use crate::error::{Error, Result};
use crate::gitcmd;
use crate::overrides::OverrideSet;
use crate::series::{Commit, Series};
use crate::toolchain::Toolchains;

/// One (board, commit) compilation unit, the atomic unit of scheduling.
#[derive(Debug, Clone)]
pub struct Job {
    pub board: Board,
    pub commit: Option<Commit>,
}

/// One result per job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub target: String,
    pub commit_hash: Option<String>,
    pub sequence: Option<usize>,
    pub status: JobStatus,
    pub message: String,
    pub warning_count: usize,
    pub sizes: Option<SectionSizes>,
    /// Total-size change against the previous commit for the same board.
    pub size_delta: Option<i64>,
    /// True when a done-marker let the job skip the build entirely.
    pub skipped: bool,
}

impl JobResult {
    fn from_record(record: &JobRecord) -> Self {
        Self {
            target: record.target.clone(),
            commit_hash: record.commit_hash.clone(),
            sequence: record.sequence,
            status: record.status,
            message: record.message.clone(),
            warning_count: record.warning_count,
            sizes: record.sizes,
            size_delta: None,
            skipped: true,
        }
    }

    fn exception(job: &Job, message: String) -> Self {
        Self {
            target: job.board.target.clone(),
            commit_hash: job.commit.as_ref().map(|c| c.hash.clone()),
            sequence: job.commit.as_ref().map(|c| c.sequence),
            status: JobStatus::Exception,
            message,
            warning_count: 0,
            sizes: None,
            size_delta: None,
            skipped: false,
        }
    }
}

/// Aggregate counts across all jobs; the sole input to exit derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    pub ok: usize,
    pub warned: usize,
    pub failed: usize,
    pub exceptions: usize,
}

impl Outcome {
    pub fn from_results(results: &[JobResult]) -> Self {
        let mut outcome = Self::default();
        for result in results {
            match result.status {
                JobStatus::Ok => outcome.ok += 1,
                JobStatus::Warned => outcome.warned += 1,
                JobStatus::Failed => outcome.failed += 1,
                JobStatus::Exception => outcome.exceptions += 1,
            }
        }
        outcome
    }

    pub fn total(&self) -> usize {
        self.ok + self.warned + self.failed + self.exceptions
    }
}

/// Scheduler configuration, set once per run.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Final output root (branch subdirectory already applied).
    pub out_root: PathBuf,
    pub threads: Option<usize>,
    /// Flatten the per-commit subdirectory level.
    pub no_subdirs: bool,
    /// Build directly in the output root without a lane checkout. Valid
    /// only for exactly one board and one commit.
    pub work_in_output: bool,
    pub force_build: bool,
    pub force_build_failures: bool,
    pub force_reconfig: bool,
    pub mrproper: bool,
    pub allow_missing: bool,
    pub collect_sizes: bool,
    /// Diagnostic mode: make every lane fault before building, to verify
    /// faults surface as Exception results instead of losing the pool.
    pub test_lane_faults: bool,
}

/// Worker count: one per CPU, capped by the number of selected boards.
pub fn effective_threads(requested: Option<usize>, selected: usize) -> usize {
    requested
        .unwrap_or_else(|| num_cpus::get().min(selected))
        .max(1)
}

/// Per-job internal parallelism when not given: spread CPUs over boards.
pub fn effective_jobs(requested: Option<usize>, selected: usize) -> usize {
    requested
        .unwrap_or_else(|| num_cpus::get().div_ceil(selected.max(1)))
        .max(1)
}

/// The concurrent matrix executor. Constructed by and returned to the
/// caller; holds no global state.
pub struct Scheduler {
    opts: SchedulerOptions,
    src: PathBuf,
    builder: NativeBuilder,
    toolchains: Toolchains,
    override_set: OverrideSet,
}

struct Lane<'a> {
    index: usize,
    boards: Vec<&'a Board>,
}

impl Scheduler {
    pub fn new(
        opts: SchedulerOptions,
        src: PathBuf,
        builder: NativeBuilder,
        toolchains: Toolchains,
        override_set: OverrideSet,
    ) -> Self {
        Self {
            opts,
            src,
            builder,
            toolchains,
            override_set,
        }
    }

    /// Deterministic output directory for one job.
    pub fn job_out_dir(&self, board: &Board, commit: Option<&Commit>) -> PathBuf {
        if self.opts.work_in_output {
            return self.opts.out_root.clone();
        }
        let mut dir = self.opts.out_root.join(&board.target);
        if let Some(commit) = commit {
            if !self.opts.no_subdirs {
                let short = &commit.hash[..commit.hash.len().min(8)];
                dir.push(format!("{:02}_g{}", commit.sequence, short));
            }
        }
        dir
    }

    /// Run the matrix to completion and aggregate the results.
    ///
    /// Produces exactly `boards x commits` results (or `boards` when there
    /// is no series), whatever the individual outcomes.
    pub fn run(
        &self,
        selection: &Selection,
        series: Option<&Series>,
    ) -> Result<(Outcome, Vec<JobResult>)> {
        self.check_work_in_output(selection, series)?;

        let boards: Vec<&Board> = selection.boards.values().collect();
        let threads = effective_threads(self.opts.threads, boards.len());
        let lanes = deal_lanes(&boards, threads);
        info!(
            "scheduling {} boards x {} commits on {} lanes",
            boards.len(),
            series.map_or(1, Series::len),
            lanes.len()
        );

        let results: Mutex<Vec<JobResult>> = Mutex::new(Vec::new());
        let table = &results;
        thread::scope(|scope| {
            for lane in &lanes {
                scope.spawn(move || self.run_lane(lane, series, table));
            }
        });

        let mut results = results.into_inner().map_err(|_| Error::LockPoisoned {
            context: "scheduler result table".to_string(),
        })?;
        results.sort_by(|a, b| (&a.target, a.sequence).cmp(&(&b.target, b.sequence)));

        let outcome = Outcome::from_results(&results);
        debug!(
            "matrix done: {} ok, {} warned, {} failed, {} exceptions",
            outcome.ok, outcome.warned, outcome.failed, outcome.exceptions
        );
        Ok((outcome, results))
    }

    fn check_work_in_output(&self, selection: &Selection, series: Option<&Series>) -> Result<()> {
        if !self.opts.work_in_output {
            return Ok(());
        }
        if selection.len() != 1 {
            return Err(Error::WorkInOutput {
                message: format!("{} boards selected", selection.len()),
            });
        }
        let commits = series.map_or(1, Series::len);
        if commits != 1 {
            return Err(Error::WorkInOutput {
                message: format!("{commits} commits selected"),
            });
        }
        Ok(())
    }

    /// One worker lane: private checkout, commits in sequence order.
    ///
    /// Never returns an error to the pool; every fault becomes an
    /// `Exception` result for the affected job.
    fn run_lane(&self, lane: &Lane, series: Option<&Series>, results: &Mutex<Vec<JobResult>>) {
        let commits: Vec<Option<&Commit>> = match series {
            Some(series) => series.commits.iter().map(Some).collect(),
            None => vec![None],
        };

        // Lane-private clone, created on the first job needing a checkout.
        let mut tree: Option<PathBuf> = None;
        // Previous commit's sizes per board, for same-board deltas only.
        let mut prev_sizes: BTreeMap<String, SectionSizes> = BTreeMap::new();

        for commit in commits {
            let mut checked_out = false;
            for board in &lane.boards {
                let job = Job {
                    board: (*board).clone(),
                    commit: commit.cloned(),
                };
                let result = match self.run_job(&job, lane, &mut tree, commit, &mut checked_out)
                {
                    Ok(mut result) => {
                        result.size_delta = size_delta(&prev_sizes, &job, result.sizes);
                        if let Some(sizes) = result.sizes {
                            prev_sizes.insert(job.board.target.clone(), sizes);
                        }
                        result
                    }
                    Err(e) => JobResult::exception(&job, e.to_string()),
                };
                push_result(results, result);
            }
        }
    }

    /// The lane's private working tree, cloned on first use.
    fn lane_tree<'a>(&'a self, lane: &Lane, tree: &'a mut Option<PathBuf>) -> Result<&'a Path> {
        if tree.is_none() {
            let dir = self
                .opts
                .out_root
                .join(".lanes")
                .join(format!("lane{:02}", lane.index));
            gitcmd::clone_local(&self.src, &dir)?;
            *tree = Some(dir);
        }
        Ok(tree.as_deref().unwrap_or(self.src.as_path()))
    }

    fn run_job(
        &self,
        job: &Job,
        lane: &Lane,
        tree: &mut Option<PathBuf>,
        commit: Option<&Commit>,
        checked_out: &mut bool,
    ) -> Result<JobResult> {
        if self.opts.test_lane_faults {
            return Err(Error::Build {
                message: "deliberate lane fault (diagnostic mode)".to_string(),
            });
        }

        let out_dir = self.job_out_dir(&job.board, commit);
        if let Some(record) = self.skippable_record(&out_dir) {
            debug!("skipping {}: already built", job.board.target);
            return Ok(JobResult::from_record(&record));
        }

        let tree: &Path = if commit.is_none() || self.opts.work_in_output {
            self.src.as_path()
        } else {
            self.lane_tree(lane, tree)?
        };

        // One checkout per commit per lane, shared by all the lane's boards.
        if let Some(commit) = commit {
            if !*checked_out && tree != self.src {
                gitcmd::checkout_detached(tree, &commit.hash)?;
                *checked_out = true;
            }
        }

        let toolchain = self.toolchains.resolve(&job.board.arch)?;
        let request = BuildRequest {
            target: job.board.target.clone(),
            force_reconfig: self.opts.force_reconfig,
            mrproper: self.opts.mrproper,
            allow_missing: self.opts.allow_missing,
        };
        let output = self
            .builder
            .build(tree, &out_dir, &toolchain, &self.override_set, &request)?;

        let status = classify(&output, self.opts.allow_missing);
        let sizes = if self.opts.collect_sizes && status != JobStatus::Failed {
            self.builder.read_sizes(&out_dir, &toolchain)
        } else {
            None
        };

        let record = JobRecord {
            target: job.board.target.clone(),
            commit_hash: commit.map(|c| c.hash.clone()),
            sequence: commit.map(|c| c.sequence),
            status,
            message: output.message.clone(),
            warning_count: output.warnings.len(),
            sizes,
        };
        record.write(&out_dir)?;

        Ok(JobResult {
            target: job.board.target.clone(),
            commit_hash: commit.map(|c| c.hash.clone()),
            sequence: commit.map(|c| c.sequence),
            status,
            message: output.message,
            warning_count: output.warnings.len(),
            sizes,
            size_delta: None,
            skipped: false,
        })
    }

    /// The done-marker record for `out_dir`, when the skip policy applies.
    fn skippable_record(&self, out_dir: &Path) -> Option<JobRecord> {
        if self.opts.force_build || !JobRecord::exists(out_dir) {
            return None;
        }
        let record = JobRecord::read(out_dir).ok()?;
        if self.opts.force_build_failures
            && matches!(record.status, JobStatus::Failed | JobStatus::Exception)
        {
            return None;
        }
        Some(record)
    }
}

/// Deal boards round-robin onto `threads` lanes, dropping empty lanes.
fn deal_lanes<'a>(boards: &[&'a Board], threads: usize) -> Vec<Lane<'a>> {
    let mut lanes: Vec<Lane> = (0..threads.min(boards.len()))
        .map(|index| Lane {
            index,
            boards: Vec::new(),
        })
        .collect();
    for (i, board) in boards.iter().enumerate() {
        let lane = i % lanes.len();
        lanes[lane].boards.push(board);
    }
    lanes
}

fn size_delta(
    prev: &BTreeMap<String, SectionSizes>,
    job: &Job,
    sizes: Option<SectionSizes>,
) -> Option<i64> {
    let now = sizes?;
    let before = prev.get(&job.board.target)?;
    Some(now.total() as i64 - before.total() as i64)
}

fn push_result(results: &Mutex<Vec<JobResult>>, result: JobResult) {
    // A poisoned lock means a sibling lane panicked; losing results at
    // that point is acceptable, the process is already failing.
    if let Ok(mut table) = results.lock() {
        table.push(result);
    }
}
