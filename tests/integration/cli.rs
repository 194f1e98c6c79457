//! CLI smoke tests for the `rollout` binary.

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use rollout::manifest::{Channel, TrackedVersion, UpdateManifest, sha256};
use rollout::test_utils::gzip;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn rollout() -> Command {
    Command::cargo_bin("rollout").unwrap()
}

#[test]
fn help_lists_subcommands() {
    rollout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("promote"));
}

#[test]
fn check_fails_loudly_without_a_config() {
    let dir = TempDir::new().unwrap();
    rollout()
        .env("ROLLOUT_CONFIG_PATH", dir.path().join("missing.toml"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn status_reports_version_and_due_check() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
app_name = "myapp"
current_version = "1.0"
manifest_url = "https://updates.example.com/meta"
binary_url = "https://updates.example.com/bin"
state_dir = "{}"
"#,
            dir.path().join("state").display()
        ),
    )
    .unwrap();

    rollout()
        .args(["status", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("version:    1.0"))
        .stdout(predicate::str::contains("channel:    stable"))
        .stdout(predicate::str::contains("next check: due now"));
}

#[test]
fn promote_moves_an_aged_dev_version_to_beta() {
    let root = TempDir::new().unwrap();
    let binary = b"cli promoted build".to_vec();

    // Publish 1.0 to dev by hand, the way the packaging tool would.
    let dev_dir = root.path().join("myapp").join("dev");
    std::fs::create_dir_all(dev_dir.join("1.0")).unwrap();
    let manifest = UpdateManifest {
        version: "1.0".to_string(),
        sha256: sha256(&binary).to_vec(),
        channel: Channel::dev(),
        date: Utc::now() - Duration::hours(30),
    };
    std::fs::write(
        dev_dir.join("linux-x86_64.json"),
        serde_json::to_vec(&manifest).unwrap(),
    )
    .unwrap();
    std::fs::write(dev_dir.join("1.0").join("linux-x86_64.gz"), gzip(&binary)).unwrap();

    let tracking = root.path().join("tracking.json");
    let mut records = BTreeMap::new();
    records.insert(
        "1.0".to_string(),
        TrackedVersion {
            version: "1.0".to_string(),
            channel: Channel::dev(),
            date: Utc::now() - Duration::hours(30),
            dev_approved: false,
            beta_approved: false,
        },
    );
    std::fs::write(&tracking, serde_json::to_vec_pretty(&records).unwrap()).unwrap();

    rollout()
        .arg("promote")
        .args(["--app", "myapp", "--platform", "linux-x86_64"])
        .arg("--root")
        .arg(root.path())
        .arg("--tracking")
        .arg(&tracking)
        .assert()
        .success()
        .stdout(predicate::str::contains("promoted: 1.0 dev -> beta"));

    // The beta pair exists and the record advanced.
    let beta_manifest = root
        .path()
        .join("myapp")
        .join("beta")
        .join("linux-x86_64.json");
    let raw = std::fs::read(&beta_manifest).unwrap();
    let promoted: UpdateManifest = serde_json::from_slice(&raw).unwrap();
    assert_eq!(promoted.channel, Channel::beta());
    assert_eq!(promoted.sha256, sha256(&binary));
    assert!(
        root.path()
            .join("myapp")
            .join("beta")
            .join("1.0")
            .join("linux-x86_64.gz")
            .exists()
    );

    let records: BTreeMap<String, TrackedVersion> =
        serde_json::from_slice(&std::fs::read(&tracking).unwrap()).unwrap();
    assert!(records["1.0"].dev_approved);
    assert_eq!(records["1.0"].channel, Channel::beta());
}

#[test]
fn promote_reports_failures_with_a_nonzero_exit() {
    let root = TempDir::new().unwrap();
    let tracking = root.path().join("tracking.json");

    // A tracked version with no published artifacts.
    let mut records = BTreeMap::new();
    records.insert(
        "9.9".to_string(),
        TrackedVersion {
            version: "9.9".to_string(),
            channel: Channel::dev(),
            date: Utc::now() - Duration::hours(48),
            dev_approved: false,
            beta_approved: false,
        },
    );
    std::fs::write(&tracking, serde_json::to_vec_pretty(&records).unwrap()).unwrap();

    rollout()
        .arg("promote")
        .args(["--app", "myapp", "--platform", "linux-x86_64"])
        .arg("--root")
        .arg(root.path())
        .arg("--tracking")
        .arg(&tracking)
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 failed"));
}
