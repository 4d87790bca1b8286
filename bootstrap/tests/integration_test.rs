// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for Kea-Bootstrap

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Config pointing at `workspace` with probes that fail fast
fn write_config(dir: &Path, workspace: &Path) -> std::path::PathBuf {
    let config_path = dir.join("bootstrap.toml");
    let config_content = format!(
        r#"[workspace]
dir = "{}"

[network]
metadata_url = "http://127.0.0.1:9/latest/meta-data/ami-id"
public_ip_url = "http://127.0.0.1:9/ip"
probe_timeout_secs = 1
lookup_timeout_secs = 1
"#,
        workspace.display()
    );
    std::fs::write(&config_path, config_content).unwrap();
    config_path
}

/// Test the version command
#[test]
fn test_version_command() {
    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Kea-Bootstrap"))
        .stdout(predicate::str::contains("ansible-vpn"));
}

/// Test the help output
#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ansible-vpn"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("check-domain"))
        .stdout(predicate::str::contains("--dry-run"));
}

/// Test init command
#[test]
fn test_init_command() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bootstrap.toml");

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    assert!(config_path.exists());
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("repo_url"));
    assert!(content.contains("[network]"));
}

/// Test init refuses to overwrite without --force
#[test]
fn test_init_no_overwrite() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bootstrap.toml");
    std::fs::write(&config_path, "# existing").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("init");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("init").arg("--force");
    cmd.assert().success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("repo_url"));
}

/// Test config command with defaults
#[test]
fn test_config_defaults() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("nonexistent.toml");

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("config");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Using defaults"))
        .stdout(predicate::str::contains("root@localhost.com"))
        .stdout(predicate::str::contains("ansible-vpn"));
}

/// Test that an unreadable config is reported
#[test]
fn test_invalid_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("bootstrap.toml");
    std::fs::write(&config_path, "[network\nbroken").unwrap();

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("config");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

/// Test the JSON host report
#[test]
fn test_probe_json() {
    let temp_dir = tempdir().unwrap();
    let config_path = write_config(temp_dir.path(), temp_dir.path());

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("probe")
        .arg("--format")
        .arg("json");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"family\""))
        .stdout(predicate::str::contains("\"cloud_instance\": false"));
}

/// Test check-domain rejects malformed names before any lookup
#[test]
fn test_check_domain_invalid() {
    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("check-domain").arg("VPN.Example.org");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid domain name"));
}

/// Test a dry run over an already configured workspace
#[test]
fn test_dry_run_existing_configuration() {
    let temp_dir = tempdir().unwrap();
    let workspace = temp_dir.path().join("ansible-vpn");
    std::fs::create_dir_all(workspace.join(".venv")).unwrap();
    std::fs::write(workspace.join("custom.yml"), "username: kea\n").unwrap();
    let config_path = write_config(temp_dir.path(), &workspace);

    let mut cmd = Command::cargo_bin("bootstrap").unwrap();
    cmd.arg("--config").arg(&config_path).arg("--dry-run").arg("run");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would execute: git pull"))
        .stdout(predicate::str::contains(
            "[DRY RUN] Would execute: ansible-playbook --ask-vault-pass run.yml",
        ))
        .stdout(predicate::str::contains("ansible-vault").not());

    // Nothing in the workspace is touched
    let custom = std::fs::read_to_string(workspace.join("custom.yml")).unwrap();
    assert_eq!(custom, "username: kea\n");
    assert!(!workspace.join("secret.yml").exists());
}
