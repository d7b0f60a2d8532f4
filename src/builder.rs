//! Native build collaborator
//!
//! Drives one native build invocation per job: configure the target into
//! its output directory, apply the override set to the generated `.config`,
//! run the build, then classify the outcome from the exit status and the
//! diagnostic stream.
//!
//! A "built" marker record (JSON) is persisted in each job's output
//! directory. The scheduler's skip policy and the summary mode both read
//! these records, which is what makes re-runs idempotent.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::overrides::{self, OverrideSet};
use crate::toolchain::Toolchain;

/// File name of the per-job marker record.
pub const RECORD_FILE: &str = ".bg-done.json";

/// Artifact names probed for size accounting, in preference order.
const SIZE_ARTIFACTS: &[&str] = &["firmware.elf", "u-boot"];

/// Classification of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Built with no diagnostic output.
    Ok,
    /// Built with warnings, or a tolerated missing blob.
    Warned,
    /// Non-zero build exit, or a missing blob without tolerance.
    Failed,
    /// The orchestration itself faulted; an environment defect, not a
    /// problem in the code under test.
    Exception,
}

/// Compiled-section sizes for one job, for regression comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSizes {
    pub text: u64,
    pub data: u64,
    pub bss: u64,
}

impl SectionSizes {
    pub fn total(&self) -> u64 {
        self.text + self.data + self.bss
    }
}

/// Persisted per-job record, doubling as the "built" marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub target: String,
    pub commit_hash: Option<String>,
    pub sequence: Option<usize>,
    pub status: JobStatus,
    pub message: String,
    pub warning_count: usize,
    pub sizes: Option<SectionSizes>,
}

impl JobRecord {
    pub fn write(&self, out_dir: &Path) -> Result<()> {
        fs::create_dir_all(out_dir)?;
        let path = out_dir.join(RECORD_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn read(out_dir: &Path) -> Result<Self> {
        let path = out_dir.join(RECORD_FILE);
        let text = fs::read_to_string(&path).map_err(|e| Error::Record {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| Error::Record {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn exists(out_dir: &Path) -> bool {
        out_dir.join(RECORD_FILE).is_file()
    }
}

/// Raw outcome of one native build invocation, before classification.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub success: bool,
    pub warnings: Vec<String>,
    pub missing_blob: bool,
    pub message: String,
}

/// Per-job knobs forwarded from the scheduler.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub target: String,
    pub force_reconfig: bool,
    pub mrproper: bool,
    pub allow_missing: bool,
}

/// Handle on the located native build tool.
#[derive(Debug, Clone)]
pub struct NativeBuilder {
    make: PathBuf,
    jobs: usize,
}

impl NativeBuilder {
    /// Locate the build tool: `$MAKE` if set, otherwise `make` on `PATH`.
    pub fn locate(jobs: usize) -> Result<Self> {
        let tool = env::var_os("MAKE")
            .map(PathBuf::from)
            .or_else(|| find_on_path("make"));
        match tool {
            Some(make) => Ok(Self { make, jobs }),
            None => Err(Error::Build {
                message: "GNU make not found on PATH (set MAKE to override)".to_string(),
            }),
        }
    }

    /// Use an explicit tool path; used by tests with a stub script.
    pub fn with_tool(make: PathBuf, jobs: usize) -> Self {
        Self { make, jobs }
    }

    /// Configure and build one target in `src`, outputting to `out_dir`.
    pub fn build(
        &self,
        src: &Path,
        out_dir: &Path,
        toolchain: &Toolchain,
        override_set: &OverrideSet,
        req: &BuildRequest,
    ) -> Result<BuildOutput> {
        fs::create_dir_all(out_dir)?;
        if req.mrproper {
            clean_dir(out_dir)?;
        }

        let config = out_dir.join(".config");
        if !config.exists() || req.force_reconfig {
            let defconfig = format!("{}_defconfig", req.target);
            let out = self.invoke(src, out_dir, toolchain, req, &[&defconfig])?;
            if !out.success {
                return Ok(out);
            }
            if config.exists() {
                overrides::apply_to_config(override_set, &config)?;
            }
        }

        let out = self.invoke(src, out_dir, toolchain, req, &[])?;
        trace!(
            "build {}: success={} warnings={}",
            req.target,
            out.success,
            out.warnings.len()
        );
        Ok(out)
    }

    fn invoke(
        &self,
        src: &Path,
        out_dir: &Path,
        toolchain: &Toolchain,
        req: &BuildRequest,
        extra: &[&str],
    ) -> Result<BuildOutput> {
        let mut cmd = Command::new(&self.make);
        cmd.current_dir(src)
            .arg(format!("O={}", out_dir.display()))
            .arg(format!("-j{}", self.jobs));
        for (key, value) in toolchain.env() {
            cmd.env(key, value);
        }
        if req.allow_missing {
            cmd.env("BINMAN_ALLOW_MISSING", "1");
        }
        cmd.args(extra);
        debug!("invoking {:?} for {}", self.make, req.target);

        let output = cmd.output().map_err(|e| Error::Build {
            message: format!("cannot run {}: {e}", self.make.display()),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let warnings = extract_warnings(&stderr)?;
        let missing_blob = has_missing_blob(&stderr);
        let success = output.status.success();
        let message = if success {
            String::new()
        } else {
            tail_lines(&stderr, 10)
        };
        Ok(BuildOutput {
            success,
            warnings,
            missing_blob,
            message,
        })
    }

    /// Read section sizes from the first artifact present in `out_dir`.
    ///
    /// Returns None when no artifact exists or the size tool is missing;
    /// size accounting is best-effort and never fails a build.
    pub fn read_sizes(&self, out_dir: &Path, toolchain: &Toolchain) -> Option<SectionSizes> {
        let artifact = SIZE_ARTIFACTS
            .iter()
            .map(|name| out_dir.join(name))
            .find(|p| p.is_file())?;
        let size_tool = format!("{}size", toolchain.cross_compile);
        let output = Command::new(&size_tool).arg(&artifact).output().ok()?;
        if !output.status.success() {
            return None;
        }
        parse_size_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Map a raw build output onto a job status.
pub fn classify(out: &BuildOutput, allow_missing: bool) -> JobStatus {
    if out.missing_blob && !allow_missing {
        return JobStatus::Failed;
    }
    if !out.success {
        return JobStatus::Failed;
    }
    if out.missing_blob || !out.warnings.is_empty() {
        return JobStatus::Warned;
    }
    JobStatus::Ok
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Compiler/linker warning lines from the diagnostic stream.
fn extract_warnings(stderr: &str) -> Result<Vec<String>> {
    let pattern = Regex::new(r"(?i)\bwarning[:\s]")?;
    Ok(stderr
        .lines()
        .filter(|line| pattern.is_match(line))
        .map(|line| line.trim().to_string())
        .collect())
}

/// Whether the build reported a missing required external blob.
fn has_missing_blob(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.contains("missing external blob"))
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Parse Berkeley-format `size` output.
///
/// ```text
///    text    data     bss     dec     hex filename
///  482391   27921   30720  541032   84168 firmware.elf
/// ```
fn parse_size_output(stdout: &str) -> Option<SectionSizes> {
    let line = stdout.lines().nth(1)?;
    let mut fields = line.split_whitespace();
    let text = fields.next()?.parse().ok()?;
    let data = fields.next()?.parse().ok()?;
    let bss = fields.next()?.parse().ok()?;
    Some(SectionSizes { text, data, bss })
}

fn clean_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
