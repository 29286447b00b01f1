//! End-to-end tests for the `dockstore-sync` binary.
//!
//! These tests invoke the actual CLI binary. None of them needs network
//! access: the API URL points at a local port nothing listens on.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

const UNREACHABLE_API: &str = "http://127.0.0.1:9";

/// A settings file isolated from the user's own configuration.
fn settings_file(temp: &assert_fs::TempDir, content: &str) -> assert_fs::fixture::ChildPath {
    let file = temp.child("config.yaml");
    file.write_str(content).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("refs"))
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("refresh"));
}

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_subcommand_is_usage_error() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.assert().code(2);
}

#[test]
fn test_sync_requires_repository() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("sync")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("REPOSITORY"));
}

#[test]
fn test_sync_unreachable_api() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = settings_file(&temp, "cache_max_age_secs: 5\n");
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.env_remove("DOCKSTORE_SYNC_TOKEN")
        .arg("sync")
        .arg("octo/demo")
        .arg("--config")
        .arg(config.path())
        .arg("--api-url")
        .arg(UNREACHABLE_API)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "Could not reach GitHub, please try again later",
        ));
}

#[test]
fn test_refs_unreachable_api_from_env() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = settings_file(&temp, "");
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.env("DOCKSTORE_SYNC_CONFIG", config.path())
        .env("DOCKSTORE_SYNC_API_URL", UNREACHABLE_API)
        .arg("refs")
        .arg("octo/demo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not reach GitHub"));
}

#[test]
fn test_missing_config_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refs")
        .arg("octo/demo")
        .arg("--config")
        .arg(temp.child("missing.yaml").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Settings file not found"));
}

#[test]
fn test_config_with_unknown_key() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = settings_file(&temp, "api: http://localhost\n");
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refs")
        .arg("octo/demo")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("api_url"));
}

#[test]
fn test_refresh_rejects_unknown_language() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = settings_file(&temp, "");
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refresh")
        .arg("octo/demo")
        .arg("--language")
        .arg("COBOL")
        .arg("--config")
        .arg(config.path())
        .arg("--api-url")
        .arg(UNREACHABLE_API)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Type COBOL is not a valid descriptor language.",
        ));
}

#[test]
fn test_refresh_rejects_unsupported_kind() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = settings_file(&temp, "");
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refresh")
        .arg("octo/demo")
        .arg("--language")
        .arg("NFL")
        .arg("--kind")
        .arg("tool")
        .arg("--config")
        .arg(config.path())
        .arg("--api-url")
        .arg(UNREACHABLE_API)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported descriptor"));
}

#[test]
fn test_refresh_rejects_unknown_kind() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refresh")
        .arg("octo/demo")
        .arg("--language")
        .arg("CWL")
        .arg("--kind")
        .arg("service")
        .assert()
        .code(2);
}

#[test]
fn test_refresh_named_version_requires_path() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refresh")
        .arg("octo/demo")
        .arg("--language")
        .arg("CWL")
        .arg("--version")
        .arg("v1")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--path"));
}

#[test]
fn test_refresh_has_no_hard_flag() {
    let mut cmd = cargo_bin_cmd!("dockstore-sync");

    cmd.arg("refresh")
        .arg("octo/demo")
        .arg("--language")
        .arg("CWL")
        .arg("--hard")
        .assert()
        .code(2);
}
