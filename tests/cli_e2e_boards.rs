//! End-to-end tests for the `boards` command.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

mod common;

#[test]
fn test_boards_lists_existing_table() {
    let temp = assert_fs::TempDir::new().unwrap();
    let table = temp.path().join("boards.yaml");
    common::write_board_table(&table, &["alpha", "beta"]);

    let mut cmd = cargo_bin_cmd!("build-grid");
    cmd.arg("boards")
        .arg("--table")
        .arg(&table)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("alpha"))
        .stdout(predicate::str::contains("2 boards"));
}

#[test]
fn test_boards_regenerates_from_defconfigs() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("configs/qemu_arm64_defconfig")
        .write_str("CONFIG_SYS_ARCH=\"arm\"\nCONFIG_SYS_SOC=\"qemu\"\n")
        .unwrap();
    temp.child("configs/sandbox_defconfig")
        .write_str("CONFIG_SYS_ARCH=\"sandbox\"\n")
        .unwrap();
    let table = temp.path().join("boards.yaml");

    let mut cmd = cargo_bin_cmd!("build-grid");
    cmd.arg("boards")
        .arg("--table")
        .arg(&table)
        .arg("--src")
        .arg(temp.path().join("configs"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("qemu_arm64"))
        .stdout(predicate::str::contains("sandbox"));

    assert!(table.exists());
}

#[test]
fn test_boards_missing_sources_fails() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("build-grid");
    cmd.arg("boards")
        .arg("--table")
        .arg(temp.path().join("boards.yaml"))
        .arg("--src")
        .arg(temp.path().join("nope"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no defconfig files"));
}
