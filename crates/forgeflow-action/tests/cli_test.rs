#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;

/// ヘルプが表示されること
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("forge-action").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--post"));
}

/// バージョン表示が動作すること
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("forge-action").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("forge-action"));
}

/// post フェーズは state が無ければ何もしない
#[test]
fn test_post_phase_without_state_is_noop() {
    let mut cmd = Command::cargo_bin("forge-action").unwrap();
    cmd.arg("--post")
        .env_remove("STATE_tempDir")
        .assert()
        .success();
}

/// post フェーズは state のディレクトリを削除する
#[test]
fn test_post_phase_removes_temp_dir() {
    let dir = tempfile::tempdir().unwrap();
    let kept = dir.keep();
    std::fs::write(kept.join("iidfile"), "sha256:abc").unwrap();

    let mut cmd = Command::cargo_bin("forge-action").unwrap();
    cmd.arg("--post")
        .env("STATE_tempDir", &kept)
        .assert()
        .success()
        .stdout(predicate::str::contains("Removing temp folder"));

    assert!(!kept.exists());
}
