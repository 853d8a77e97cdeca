use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// `qq` with a private, empty configuration
fn qq(temp_dir: &TempDir) -> Command {
    let config = temp_dir.path().join("config.toml");
    if !config.exists() {
        fs::write(&config, "").unwrap();
    }
    let mut cmd = Command::cargo_bin("qq").unwrap();
    cmd.env("QQ_CONFIG", &config).env_remove("QQ_SSH_CONFIG");
    cmd
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("qq").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qq 0.1.0"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("qq").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("List and copy compressed files"))
        .stdout(predicate::str::contains("--graphical <HOSTNAME> <TICKET>"));
}

#[test]
fn test_no_flags_prints_usage() {
    let temp_dir = TempDir::new().unwrap();
    qq(&temp_dir)
        .assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--list"));
}

#[test]
fn test_flag_missing_ticket() {
    let temp_dir = TempDir::new().unwrap();
    qq(&temp_dir)
        .arg("-ls")
        .arg("script01")
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 values required"));
}

#[test]
fn test_invalid_ticket() {
    let temp_dir = TempDir::new().unwrap();
    qq(&temp_dir)
        .args(["-ls", "script01", "SR1;reboot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid ticket id"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = TempDir::new().unwrap();
    qq(&temp_dir)
        .args(["--config", "/nonexistent/qq.toml", "-ls", "script01", "SR1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_missing_ssh_config() {
    let temp_dir = TempDir::new().unwrap();
    qq(&temp_dir)
        .args(["--ssh-config", "/nonexistent/ssh_config", "-ls", "script01", "SR1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SSH config does not exist"));
}

#[test]
fn test_check_reports_missing_tools() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("config.toml"),
        "ssh_program = \"/nonexistent/ssh\"\n",
    )
    .unwrap();
    qq(&temp_dir)
        .arg("--check")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("MISSING"))
        .stdout(predicate::str::contains("/nonexistent/ssh"));
}

#[test]
fn test_check_passes() {
    let temp_dir = TempDir::new().unwrap();
    let ssh_config = temp_dir.path().join("ssh_config");
    fs::write(&ssh_config, "Host *\n").unwrap();
    fs::write(
        temp_dir.path().join("config.toml"),
        format!(
            "ssh_program = \"/bin/sh\"\nrsync_program = \"/bin/sh\"\nssh_config = '{}'\n",
            ssh_config.display()
        ),
    )
    .unwrap();
    qq(&temp_dir)
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("MISSING").not());
}
