use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::{FileAssert, TestInstall};

fn updater() -> Command {
    let mut cmd = Command::cargo_bin("chromium-updater").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_flags() {
    updater()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--install"))
        .stdout(predicate::str::contains("--uninstall"))
        .stdout(predicate::str::contains("--install-dir"));
}

#[test]
fn test_install_conflicts_with_uninstall() {
    updater()
        .args(["--install", "--uninstall"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_windowed_binary_shares_the_command_line() {
    Command::cargo_bin("chromium-updater-w")
        .unwrap()
        .env("NO_COLOR", "1")
        .args(["--install", "--uninstall"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_config_reports_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    std::fs::write(&config, "daily_time = \"25:00\"\n").unwrap();

    updater()
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("daily_time must be HH:MM"));
}

#[tokio::test]
async fn test_missing_archive_tool_fails_without_touching_install() {
    let env = TestInstall::new().await.unwrap();
    let chrome = env.write_installed("chrome.exe", "chrome 11").unwrap();
    let missing_tool = env.root().join("7-Zip").join("7z.exe");
    let config = env
        .write_config(&format!(
            "install_dir = '{}'\napi_base_url = '{}'\narchive_tool = '{}'\n",
            env.install_dir().display(),
            env.server.uri(),
            missing_tool.display(),
        ))
        .unwrap();

    let output = env.run_updater(&["--config", config.to_str().unwrap()]).unwrap();

    output.assert_failure().assert_stderr_contains("7-Zip was not found");
    FileAssert::equals(&chrome, "chrome 11");
    assert!(env.server.received_requests().await.unwrap_or_default().is_empty());
}
