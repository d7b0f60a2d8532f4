//! End-to-end tests for the `build` command.
//!
//! The matrix runs against the fake build tool from `common`, driven
//! through the `MAKE` environment variable, so the full pipeline executes
//! without any cross toolchain installed.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

mod common;

struct Setup {
    temp: assert_fs::TempDir,
    make: std::path::PathBuf,
    table: std::path::PathBuf,
    src: std::path::PathBuf,
    out: std::path::PathBuf,
}

fn setup(behaviors: &[&str], targets: &[&str]) -> Setup {
    let temp = assert_fs::TempDir::new().unwrap();
    let make = common::write_fake_make(temp.path());
    let table = temp.path().join("boards.yaml");
    common::write_board_table(&table, targets);
    let src = temp.path().join("src");
    common::source_repo(&src, behaviors);
    let out = temp.path().join("out");
    Setup {
        temp,
        make,
        table,
        src,
        out,
    }
}

fn build_cmd(s: &Setup) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("build-grid");
    cmd.env("MAKE", &s.make)
        .arg("build")
        .arg("--board-table")
        .arg(&s.table)
        .arg("--git")
        .arg(&s.src)
        .arg("-o")
        .arg(&s.out);
    cmd
}

#[test]
fn test_build_current_tree_success() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("1 ok, 0 warned, 0 failed"));

    // Deterministic output layout plus the done-marker
    s.temp
        .child("out/demo/.bg-done.json")
        .assert(predicate::path::exists());
    s.temp
        .child("out/demo/firmware.elf")
        .assert(predicate::path::exists());
}

#[test]
fn test_build_branch_series_layout() {
    let s = setup(&["ok", "ok"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .args(["-b", "main", "-c", "2"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Building 2 commits for 1 board"));

    // branch subdir / target / commit subdir
    let board_dir = s.out.join("main").join("demo");
    let commit_dirs: Vec<_> = std::fs::read_dir(&board_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().unwrap().is_dir())
        .collect();
    assert_eq!(commit_dirs.len(), 2);
}

#[test]
fn test_build_warnings_exit_101() {
    let s = setup(&["warn"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .assert()
        .code(101)
        .stderr(predicate::str::contains("built with 1 warning"));
}

#[test]
fn test_build_warnings_ignored_exit_0() {
    let s = setup(&["warn"], &["demo"]);

    build_cmd(&s).arg("demo").arg("-W").assert().code(0);
}

#[test]
fn test_build_failure_exit_100() {
    let s = setup(&["fail"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .assert()
        .code(100)
        .stderr(predicate::str::contains("demo: FAILED"));
}

#[test]
fn test_build_failure_across_boards() {
    // Both boards run to completion; no early termination on failure.
    let s = setup(&["fail"], &["alpha", "beta"]);

    build_cmd(&s)
        .args(["alpha", "beta"])
        .assert()
        .code(100)
        .stdout(predicate::str::contains("0 ok, 0 warned, 2 failed"));
}

#[test]
fn test_missing_blob_tolerance() {
    let s = setup(&["blob"], &["demo"]);

    // Without tolerance the job fails
    build_cmd(&s).arg("demo").assert().code(100);

    // With tolerance it downgrades to a warning
    let s = setup(&["blob"], &["demo"]);
    build_cmd(&s).arg("demo").arg("-M").assert().code(101);
}

#[test]
fn test_rerun_skips_previously_built() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s).arg("demo").assert().code(0);

    // Sabotage the stub: a rerun must not invoke it at all
    std::fs::write(&s.make, "#!/bin/sh\nexit 9\n").unwrap();
    build_cmd(&s)
        .arg("demo")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("1 ok"));
}

#[test]
fn test_force_build_reruns() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s).arg("demo").assert().code(0);

    std::fs::write(&s.make, "#!/bin/sh\nexit 9\n").unwrap();
    build_cmd(&s).arg("demo").arg("-f").assert().code(100);
}

#[test]
fn test_dry_run_builds_nothing() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .arg("-n")
        .arg("-v")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("demo: 1 boards"));

    assert!(!s.out.exists());
}

#[test]
fn test_summary_mode_rereads_results() {
    let s = setup(&["warn"], &["demo"]);

    build_cmd(&s).arg("demo").assert().code(101);

    build_cmd(&s)
        .arg("demo")
        .arg("-s")
        .assert()
        .code(101)
        .stdout(predicate::str::contains("Summary of"))
        .stdout(predicate::str::contains("warned"));
}

#[test]
fn test_unmatched_term_warns_but_builds() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s)
        .args(["demo", "riscv"])
        .assert()
        .code(0)
        .stderr(predicate::str::contains("matched no boards"));
}

#[test]
fn test_empty_selection_is_fatal() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s)
        .arg("nonexistent")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No matching boards"));
}

#[test]
fn test_exclude_subtracts() {
    let s = setup(&["ok"], &["alpha", "beta"]);

    build_cmd(&s)
        .arg("demo")
        .args(["-x", "alpha"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("for 1 board"));
}

#[test]
fn test_work_in_output_rejects_multiple_boards() {
    let s = setup(&["ok"], &["alpha", "beta"]);

    build_cmd(&s)
        .arg("demo")
        .arg("-w")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("work-in-output"));
}

#[test]
fn test_work_in_output_single_board() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s).arg("demo").arg("-w").assert().code(0);
    s.temp
        .child("out/firmware.elf")
        .assert(predicate::path::exists());
}

#[test]
fn test_relative_output_dir_resolves_against_cwd() {
    // The native build runs inside the source tree; a relative -o must
    // still put artifacts, .config and done-markers where the orchestrator
    // looks for them, not under the source tree.
    let s = setup(&["ok"], &["demo"]);

    let mut cmd = cargo_bin_cmd!("build-grid");
    cmd.current_dir(s.temp.path())
        .env("MAKE", &s.make)
        .arg("build")
        .arg("--board-table")
        .arg(&s.table)
        .arg("--git")
        .arg(&s.src)
        .args(["-o", "relout", "-a", "EXTRA=0x1", "demo"])
        .assert()
        .code(0);

    let out = s.temp.path().join("relout/demo");
    let config = std::fs::read_to_string(out.join(".config")).unwrap();
    assert!(config.contains("CONFIG_EXTRA=0x1"));
    s.temp
        .child("relout/demo/firmware.elf")
        .assert(predicate::path::exists());
    assert!(!s.src.join("relout").exists());
}

#[test]
fn test_reproducible_override_applied_to_config() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s).arg("demo").arg("-r").assert().code(0);

    let config = std::fs::read_to_string(s.out.join("demo/.config")).unwrap();
    assert!(config.contains("# CONFIG_LOCALVERSION_AUTO is not set"));
}

#[test]
fn test_adjust_cfg_tokens_applied() {
    let s = setup(&["ok"], &["demo"]);

    build_cmd(&s)
        .arg("demo")
        .args(["-a", "EXTRA=0x42", "-a", "BASE-"])
        .assert()
        .code(0);

    let config = std::fs::read_to_string(s.out.join("demo/.config")).unwrap();
    assert!(config.contains("CONFIG_EXTRA=0x42"));
    assert!(config.contains("# CONFIG_BASE is not set"));
}
