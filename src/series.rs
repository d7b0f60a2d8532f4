//! # Series Resolver
//!
//! Derives the ordered list of commits to build from a branch or range
//! specification. The resolved series is oldest-first and numbered with a
//! 0-based `sequence`.
//!
//! When a branch (rather than an explicit count or range) is given, the
//! branch's upstream baseline is built too, at sequence 0, as a control:
//! regressions present at sequence 0 predate the branch, regressions that
//! first appear later were introduced by it.
//!
//! Commit-message trailer tags (`Key: value`) are collected oldest to
//! newest into one run-wide table. A key repeated across commits takes the
//! most recent value when overwriting is allowed, and is an error when it
//! is not. The resolver itself always allows overwriting; the strict mode
//! exists for callers that care about conflicting tags.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::gitcmd::{self, RawCommit};

/// One commit in a resolved series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Final 0-based position in the series, oldest first.
    pub sequence: usize,
    pub hash: String,
    pub subject: String,
    /// Trailer tags extracted from the commit message.
    pub tags: BTreeMap<String, String>,
}

/// The ordered set of commits under test for one invocation.
#[derive(Debug, Clone)]
pub struct Series {
    /// Branch or range expression the series was resolved from.
    pub branch: String,
    pub commits: Vec<Commit>,
    /// Run-wide tag table, merged oldest to newest.
    pub tags: BTreeMap<String, String>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Resolve the series for this invocation.
///
/// - No branch: returns `None`, meaning build the current working tree.
/// - `explicit_count`: exactly that many most-recent commits on the branch.
/// - A branch containing `..` is queried directly as a range.
/// - Otherwise the series is "commits ahead of the branch's upstream", with
///   the upstream baseline prepended as a control commit.
pub fn resolve(
    repo: &Path,
    branch: Option<&str>,
    explicit_count: Option<usize>,
) -> Result<Option<Series>> {
    let Some(branch) = branch else {
        return Ok(None);
    };

    let raw = if let Some(count) = explicit_count {
        if count == 0 {
            return Err(Error::Range {
                branch: branch.to_string(),
                message: "explicit commit count is zero".to_string(),
                hint: None,
            });
        }
        let mut commits = gitcmd::log_list(repo, branch, Some(count))?;
        commits.reverse();
        commits
    } else if branch.contains("..") {
        let mut commits = gitcmd::log_list(repo, branch, None)?;
        if commits.is_empty() {
            return Err(Error::Range {
                branch: branch.to_string(),
                message: "range has no commits".to_string(),
                hint: None,
            });
        }
        commits.reverse();
        commits
    } else {
        resolve_ahead_of_upstream(repo, branch)?
    };

    let commits = number_commits(raw)?;
    let tags = collect_tags(&commits, true)?;
    debug!(
        "resolved series for '{}': {} commits, {} tags",
        branch,
        commits.len(),
        tags.len()
    );
    Ok(Some(Series {
        branch: branch.to_string(),
        commits,
        tags,
    }))
}

/// Auto-detected case: upstream control commit plus everything ahead of it.
fn resolve_ahead_of_upstream(repo: &Path, branch: &str) -> Result<Vec<RawCommit>> {
    let upstream = gitcmd::upstream_of(repo, branch).map_err(|e| Error::Range {
        branch: branch.to_string(),
        message: format!("no upstream found: {e}"),
        hint: Some("set the branch's upstream or use -c to give a commit count".to_string()),
    })?;

    let range = format!("{upstream}..{branch}");
    let ahead = gitcmd::count_range(repo, &range)?;
    if ahead == 0 {
        return Err(Error::Range {
            branch: branch.to_string(),
            message: format!("branch has no commits ahead of '{upstream}'"),
            hint: Some("commit something on the branch or use -c".to_string()),
        });
    }

    // Control commit first, then branch commits oldest to newest.
    let mut raw = gitcmd::log_list(repo, &upstream, Some(1))?;
    let mut branch_commits = gitcmd::log_list(repo, &range, None)?;
    branch_commits.reverse();
    raw.append(&mut branch_commits);
    Ok(raw)
}

/// Turn raw commits into numbered commits with their trailer tags.
fn number_commits(raw: Vec<RawCommit>) -> Result<Vec<Commit>> {
    let trailer = Regex::new(r"^([A-Za-z][A-Za-z0-9-]*):\s*(.+)$")?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(sequence, c)| Commit {
            sequence,
            hash: c.hash,
            subject: c.subject,
            tags: extract_tags(&trailer, &c.body),
        })
        .collect())
}

fn extract_tags(trailer: &Regex, body: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for line in body.lines() {
        if let Some(caps) = trailer.captures(line.trim_end()) {
            tags.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    tags
}

/// Merge per-commit tags into one run-wide table, oldest to newest.
///
/// With `allow_overwrite`, a repeated key takes the most recent value;
/// without it a repeat is an error.
pub fn collect_tags(
    commits: &[Commit],
    allow_overwrite: bool,
) -> Result<BTreeMap<String, String>> {
    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    for commit in commits {
        for (key, value) in &commit.tags {
            if !allow_overwrite {
                if let Some(existing) = tags.get(key) {
                    if existing != value {
                        return Err(Error::DuplicateTag {
                            tag: key.clone(),
                            message: format!(
                                "'{existing}' conflicts with '{value}' in {}",
                                commit.hash
                            ),
                        });
                    }
                }
            }
            tags.insert(key.clone(), value.clone());
        }
    }
    Ok(tags)
}
