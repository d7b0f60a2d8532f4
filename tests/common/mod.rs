//! Shared fixtures for the CLI end-to-end tests.
//!
//! Builds run against a shell stub standing in for the native build tool
//! (wired up via the `MAKE` environment variable), so no cross toolchain is
//! needed. The stub's behavior is driven by a `behavior` file in the source
//! tree, which can differ per commit.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

#[allow(dead_code)]
pub const FAKE_MAKE: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do
  case "$arg" in
    O=*) out="${arg#O=}" ;;
  esac
done
for arg in "$@"; do
  case "$arg" in
    *_defconfig)
      mkdir -p "$out"
      echo "CONFIG_BASE=y" > "$out/.config"
      exit 0
      ;;
  esac
done
mkdir -p "$out"
behavior=""
[ -f behavior ] && behavior=$(cat behavior)
case "$behavior" in *warn*)
  echo "main.c:1:1: warning: stubbed warning" >&2 ;;
esac
case "$behavior" in *blob*)
  echo "firmware.bin: missing external blob 'atf-bl31'" >&2
  [ "$BINMAN_ALLOW_MISSING" = "1" ] || exit 2 ;;
esac
case "$behavior" in *fail*)
  echo "main.c:2:1: error: stubbed error" >&2
  exit 2 ;;
esac
echo built > "$out/firmware.elf"
exit 0
"#;

/// Write the fake build tool under `dir` and return its path.
#[allow(dead_code)]
pub fn write_fake_make(dir: &Path) -> PathBuf {
    let path = dir.join("fake-make");
    fs::write(&path, FAKE_MAKE).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Write a small board table with sandbox-arch boards (native compiler).
pub fn write_board_table(path: &Path, targets: &[&str]) {
    let rows: Vec<String> = targets
        .iter()
        .map(|t| {
            format!(
                "- target: {t}\n  arch: sandbox\n  soc: none\n  vendor: test\n  labels: [demo]"
            )
        })
        .collect();
    fs::write(path, rows.join("\n") + "\n").unwrap();
}

#[allow(dead_code)]
pub fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

/// Initialize a source repo whose commits carry the given stub behaviors.
#[allow(dead_code)]
pub fn source_repo(repo: &Path, behaviors: &[&str]) {
    fs::create_dir_all(repo).unwrap();
    git(repo, &["init", "--quiet", "-b", "main"]);
    git(repo, &["config", "user.name", "Test"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "commit.gpgsign", "false"]);
    for (i, behavior) in behaviors.iter().enumerate() {
        fs::write(repo.join("behavior"), behavior).unwrap();
        fs::write(repo.join("tracked.txt"), format!("rev {i}")).unwrap();
        git(repo, &["add", "."]);
        git(repo, &["commit", "--quiet", "-m", &format!("commit {i}")]);
    }
}
