//! Shared helpers for integration tests.

#![allow(dead_code)]

use anyhow::{Context, Result};
use chromium_updater::config::UpdaterConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::MockServer;

/// Path the default config requests release lists from.
pub const RELEASES_PATH: &str = "/repos/macchrome/winchrome/releases";

/// A scratch install directory plus a mock release index.
pub struct TestInstall {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    root: PathBuf,
    install_dir: PathBuf,
    pub server: MockServer,
}

impl TestInstall {
    /// Create a test environment. The install directory is not created.
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        let install_dir = root.join("Chromium");
        let server = MockServer::start().await;

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            install_dir,
            server,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Base URL assets are served from.
    pub fn download_base(&self) -> String {
        format!("{}/download", self.server.uri())
    }

    /// Updater configuration pointed at the mock server and this install
    /// directory.
    pub fn config(&self) -> UpdaterConfig {
        UpdaterConfig {
            api_base_url: self.server.uri(),
            asset_suffix: "win64.7z".to_string(),
            executable_name: "chrome.exe".to_string(),
            ..UpdaterConfig::default()
        }
        .with_install_dir(self.install_dir.clone())
    }

    /// Write a file below the install directory, creating parents.
    pub fn write_installed(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.install_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Write a config file in the scratch root and return its path.
    pub fn write_config(&self, content: &str) -> Result<PathBuf> {
        let path = self.root.join("config.toml");
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Number of requests the mock server received for `path`.
    pub async fn requests_to(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .count()
    }

    /// Run the updater binary with `args`.
    pub fn run_updater(&self, args: &[&str]) -> Result<CommandOutput> {
        let binary = env!("CARGO_BIN_EXE_chromium-updater");
        let output = Command::new(binary)
            .args(args)
            .current_dir(&self.root)
            .env("NO_COLOR", "1")
            .env("CHROMIUM_UPDATER_NO_PROGRESS", "1")
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to run chromium-updater")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

/// Command output helper
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Assert the command failed with exit code 1
    pub fn assert_failure(&self) -> &Self {
        assert!(
            !self.success && self.code == Some(1),
            "Expected exit code 1, got {:?}\nStderr: {}",
            self.code,
            self.stderr
        );
        self
    }

    /// Assert stderr contains the given text
    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Expected stderr to contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    /// Assert a file exists
    pub fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    /// Assert a file does not exist
    pub fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    /// Assert file content equals expected
    pub fn equals(path: impl AsRef<Path>, expected: &str) {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
        assert_eq!(content, expected, "Unexpected content in {}", path.display());
    }
}

/// Names of the top-level entries of `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.display(), e))
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
