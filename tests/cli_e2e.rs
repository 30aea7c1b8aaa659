//! End-to-end smoke tests for the CLI binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_describes_usage() {
    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MANIFEST"))
        .stdout(predicate::str::contains("--save-as"))
        .stdout(predicate::str::contains("--latest"));
}

#[test]
fn test_version_prints() {
    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webtoon-dl"));
}

#[test]
fn test_missing_manifest_argument_fails() {
    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("MANIFEST"));
}

#[test]
fn test_nonexistent_manifest_fails_with_context() {
    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg("/nonexistent/series.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("series manifest"));
}

#[test]
fn test_unknown_save_as_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("series.json");
    std::fs::write(&manifest, r#"{ "series_id": "x", "chapters": [] }"#).unwrap();

    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg(&manifest)
        .args(["--save-as", "tar"])
        .assert()
        .failure();
}

#[test]
fn test_empty_manifest_run_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("series.json");
    std::fs::write(&manifest, r#"{ "series_id": "x", "chapters": [] }"#).unwrap();

    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg(&manifest)
        .args(["-o"])
        .arg(dir.path())
        .arg("--quiet")
        .assert()
        .success();
}

#[test]
fn test_contradictory_range_fails() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("series.json");
    std::fs::write(&manifest, r#"{ "series_id": "x", "chapters": [] }"#).unwrap();

    Command::cargo_bin("webtoon-dl")
        .unwrap()
        .arg(&manifest)
        .args(["--start", "9", "--end", "3", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid range"));
}
