//! Source-control collaborator
//!
//! Thin wrappers around the system `git` command, which automatically
//! handles whatever authentication and configuration the user already has.
//! Everything the series resolver and the scheduler lanes need is here:
//! commit enumeration, upstream queries, detached checkouts and local
//! worktree clones.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// One enumerated commit before any sequence numbering is applied.
#[derive(Debug, Clone)]
pub struct RawCommit {
    pub hash: String,
    pub subject: String,
    pub body: String,
}

/// Run a git command in `repo` and return trimmed stdout.
pub fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .map_err(|e| Error::Git {
            command: args.join(" "),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git {
            command: args.join(" "),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Find the repository root containing `path`.
pub fn toplevel(path: &Path) -> Result<PathBuf> {
    let out = run_git(path, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(out))
}

/// Resolve a revision expression to a full hash.
pub fn rev_parse(repo: &Path, rev: &str) -> Result<String> {
    run_git(repo, &["rev-parse", rev])
}

/// Return the upstream tracking ref of `branch`, e.g. `origin/main`.
pub fn upstream_of(repo: &Path, branch: &str) -> Result<String> {
    let expr = format!("{branch}@{{upstream}}");
    run_git(repo, &["rev-parse", "--abbrev-ref", &expr])
}

/// Count commits reachable via `range` (a full `a..b` expression).
pub fn count_range(repo: &Path, range: &str) -> Result<usize> {
    let out = run_git(repo, &["rev-list", "--count", range])?;
    out.parse::<usize>().map_err(|e| Error::Git {
        command: format!("rev-list --count {range}"),
        stderr: format!("unparseable count '{out}': {e}"),
    })
}

// Unit separators keep subjects containing newlines-adjacent punctuation
// unambiguous; %x1f between fields, %x1e after each commit.
const LOG_FORMAT: &str = "--format=%H%x1f%s%x1f%b%x1e";

/// Enumerate commits for a revision expression, newest first (git order).
///
/// `max` limits the walk like `git log -n`; `None` walks the whole range.
pub fn log_list(repo: &Path, rev_expr: &str, max: Option<usize>) -> Result<Vec<RawCommit>> {
    let limit;
    let mut args = vec!["log", LOG_FORMAT];
    if let Some(n) = max {
        limit = format!("-n{n}");
        args.push(&limit);
    }
    args.push(rev_expr);

    let out = run_git(repo, &args)?;
    let mut commits = Vec::new();
    for entry in out.split('\x1e') {
        let entry = entry.trim_matches(['\n', ' ']);
        if entry.is_empty() {
            continue;
        }
        let mut fields = entry.splitn(3, '\x1f');
        let hash = fields.next().unwrap_or_default().trim().to_string();
        let subject = fields.next().unwrap_or_default().trim().to_string();
        let body = fields.next().unwrap_or_default().to_string();
        if hash.is_empty() {
            continue;
        }
        commits.push(RawCommit {
            hash,
            subject,
            body,
        });
    }
    Ok(commits)
}

/// Check out `rev` detached in `repo`, discarding local modifications.
pub fn checkout_detached(repo: &Path, rev: &str) -> Result<()> {
    run_git(repo, &["checkout", "--force", "--detach", rev])?;
    Ok(())
}

/// Clone `src` into `dest` as a lane-private working tree.
///
/// A plain local clone shares objects via hardlinks, so per-lane copies of
/// a large tree stay cheap.
pub fn clone_local(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let output = Command::new("git")
        .arg("clone")
        .arg("--quiet")
        .arg(src)
        .arg(dest)
        .output()
        .map_err(|e| Error::Git {
            command: "clone".to_string(),
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::Git {
            command: "clone".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_list_order_and_fields() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "first commit");
        testrepo::commit(repo, "a.txt", "second commit");

        let commits = log_list(repo, "HEAD", None).unwrap();
        assert_eq!(commits.len(), 2);
        // git log is newest first
        assert_eq!(commits[0].subject, "second commit");
        assert_eq!(commits[1].subject, "first commit");
        assert_eq!(commits[0].hash.len(), 40);
    }

    #[test]
    fn test_log_list_max() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "one");
        testrepo::commit(repo, "a.txt", "two");
        testrepo::commit(repo, "a.txt", "three");

        let commits = log_list(repo, "HEAD", Some(2)).unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "three");
    }

    #[test]
    fn test_log_list_body_preserved() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "subject line\n\nBody text\nTag: value");

        let commits = log_list(repo, "HEAD", None).unwrap();
        assert_eq!(commits[0].subject, "subject line");
        assert!(commits[0].body.contains("Tag: value"));
    }

    #[test]
    fn test_count_range() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "one");
        let base = rev_parse(repo, "HEAD").unwrap();
        testrepo::commit(repo, "a.txt", "two");
        testrepo::commit(repo, "a.txt", "three");

        let count = count_range(repo, &format!("{base}..HEAD")).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_upstream_of_missing_upstream_errors() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "one");

        let err = upstream_of(repo, "main").unwrap_err();
        assert!(matches!(err, Error::Git { .. }));
    }

    #[test]
    fn test_checkout_detached_and_back() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path();
        testrepo::init(repo);
        testrepo::commit(repo, "a.txt", "one");
        let first = rev_parse(repo, "HEAD").unwrap();
        testrepo::commit(repo, "a.txt", "two");

        checkout_detached(repo, &first).unwrap();
        assert_eq!(rev_parse(repo, "HEAD").unwrap(), first);
    }

    #[test]
    fn test_clone_local() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("src");
        testrepo::init(&repo);
        testrepo::commit(&repo, "a.txt", "one");

        let dest = temp.path().join("lanes/lane0");
        clone_local(&repo, &dest).unwrap();
        assert!(dest.join("a.txt").exists());
    }
}
