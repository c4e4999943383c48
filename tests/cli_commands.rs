//! Tests for the human-facing subcommands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{TempDir, tempdir};

/// `ptg` with an isolated HOME so user config cannot leak in.
#[allow(deprecated)]
fn ptg(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ptg").expect("failed to find binary");
    cmd.env_clear()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"));
    cmd
}

#[test]
fn test_subcommand_reports_block_and_suggestion() {
    let home = tempdir().unwrap();
    let project = tempdir().unwrap();
    fs::write(project.path().join("uv.lock"), "").unwrap();

    ptg(&home)
        .args(["test", "python -m pytest", "--dir"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Result: BLOCKED"))
        .stdout(predicate::str::contains("Policy: python_manager"))
        .stdout(predicate::str::contains("Suggestion: uv run python -m pytest"));
}

#[test]
fn test_subcommand_allows_in_unmanaged_dir() {
    let home = tempdir().unwrap();
    let project = tempdir().unwrap();

    ptg(&home)
        .args(["test", "python app.py", "--dir"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Result: ALLOWED"));
}

#[test]
fn test_subcommand_enables_extra_policies() {
    let home = tempdir().unwrap();
    let project = tempdir().unwrap();

    ptg(&home)
        .args(["test", "gh api -X DELETE repos/o/r", "--policies", "github_write", "--dir"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy: github_write"))
        .stdout(predicate::str::contains("Message:"))
        .stdout(predicate::str::contains("GitHub write blocked: gh api DELETE"));
}

#[test]
fn test_subcommand_rejects_missing_dir() {
    let home = tempdir().unwrap();
    ptg(&home)
        .args(["test", "python app.py", "--dir", "/definitely/not/here"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn detect_json_lists_signals_and_owner() {
    let home = tempdir().unwrap();
    let project = tempdir().unwrap();
    fs::write(
        project.path().join("pyproject.toml"),
        "[tool.hatch.envs.default]\ndependencies = []\n",
    )
    .unwrap();
    fs::write(project.path().join("pixi.toml"), "").unwrap();

    let output = ptg(&home)
        .args(["detect", "--format", "json", "--dir"])
        .arg(project.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["owner"], "hatch");
    assert_eq!(report["run_wrapper"], "hatch run");
    assert_eq!(report["signals"].as_array().unwrap().len(), 2);
}

#[test]
fn detect_pretty_without_markers() {
    let home = tempdir().unwrap();
    let project = tempdir().unwrap();
    ptg(&home)
        .args(["detect", "--dir"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No package manager markers found."))
        .stdout(predicate::str::contains("Owner: none"));
}

#[test]
fn policies_lists_every_policy() {
    let home = tempdir().unwrap();
    ptg(&home)
        .arg("policies")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ python_manager"))
        .stdout(predicate::str::contains("○ modern_cli"))
        .stdout(predicate::str::contains("○ native_timeout"))
        .stdout(predicate::str::contains("○ github_write"));
}

#[test]
fn policies_follow_env_overrides() {
    let home = tempdir().unwrap();
    ptg(&home)
        .arg("policies")
        .env("PTG_POLICIES", "native_timeout")
        .env("PTG_DISABLE", "python_manager")
        .assert()
        .success()
        .stdout(predicate::str::contains("○ python_manager"))
        .stdout(predicate::str::contains("✓ native_timeout"));
}

#[test]
fn init_writes_sample_and_refuses_overwrite() {
    let home = tempdir().unwrap();
    let target = home.path().join("nested/config.toml");

    ptg(&home)
        .args(["init", "--output"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written to"));
    assert!(fs::read_to_string(&target).unwrap().contains("[policies]"));

    ptg(&home)
        .args(["init", "--output"])
        .arg(&target)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    ptg(&home)
        .args(["init", "--force", "--output"])
        .arg(&target)
        .assert()
        .success();
}

#[test]
fn config_shows_explicit_config_file() {
    let home = tempdir().unwrap();
    let config_path = home.path().join("extra.toml");
    fs::write(&config_path, "[general]\nverbose = true\n").unwrap();

    ptg(&home)
        .arg("config")
        .env("PTG_CONFIG", &config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("verbose = true"));
}

#[test]
fn config_swallows_parse_errors() {
    let home = tempdir().unwrap();
    let config_path = home.path().join("broken.toml");
    fs::write(&config_path, "[general]\nverbose = true\ninvalid_syntax_here =\n").unwrap();

    ptg(&home)
        .arg("config")
        .env("PTG_CONFIG", &config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("verbose = false"));
}

#[test]
fn version_flag_prints_package_version() {
    let home = tempdir().unwrap();
    ptg(&home)
        .arg("--version")
        .assert()
        .success()
        .stderr(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_does_not_exit_with_block_status() {
    let home = tempdir().unwrap();
    ptg(&home).arg("frobnicate").assert().code(1);
}
