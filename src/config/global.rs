//! Global configuration for the updater.
//!
//! Install location, release repository, asset naming and task name all live
//! here, so they can be overridden per machine and replaced wholesale in tests.
//!
//! # Configuration File Location
//!
//! 1. `--config <path>` on the command line
//! 2. `CHROMIUM_UPDATER_CONFIG` environment variable
//! 3. `<config_dir>/chromium-updater/config.toml`
//!
//! A missing file yields defaults; a malformed file is an error.
//!
//! # File Format
//!
//! ```toml
//! install_dir = "${PROGRAMFILES}/Ungoogled Chromium"
//! owner = "macchrome"
//! repo = "winchrome"
//! release_name_filter = "ungoogled"
//! asset_suffix = "win64.7z"
//! daily_time = "03:30"
//! ```

use crate::core::UpdaterError;
use crate::utils::platform;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "CHROMIUM_UPDATER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Directory the browser is installed into.
    ///
    /// `~`, `$VAR` and `${VAR}` are expanded on load.
    #[serde(default = "platform::default_install_dir")]
    pub install_dir: PathBuf,

    /// Owner of the repository publishing releases.
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository publishing releases.
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Base URL of the release index API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Case-insensitive substring a release name must contain.
    #[serde(default = "default_release_name_filter")]
    pub release_name_filter: String,

    /// Case-insensitive suffix an asset name must end with.
    #[serde(default = "platform::default_asset_suffix")]
    pub asset_suffix: String,

    /// Regex extracting the version from a release tag; group 1 is the version.
    #[serde(default = "default_version_pattern")]
    pub version_pattern: String,

    /// File name of the browser executable inside `install_dir`.
    #[serde(default = "default_executable_name")]
    pub executable_name: String,

    /// Extension of the archive entry whose stem names the version.
    #[serde(default = "default_manifest_extension")]
    pub manifest_extension: String,

    /// Explicit path to the 7-Zip executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_tool: Option<PathBuf>,

    /// File name of the installed version record.
    #[serde(default = "default_record_file_name")]
    pub record_file_name: String,

    /// File name of the transient download.
    #[serde(default = "default_archive_file_name")]
    pub archive_file_name: String,

    /// Name of the login entry and scheduled task.
    #[serde(default = "default_task_name")]
    pub task_name: String,

    /// Time of day (`HH:MM`) for the daily run.
    #[serde(default = "default_daily_time")]
    pub daily_time: String,

    /// User agent sent to the release index.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional API token; falls back to `GITHUB_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
}

fn default_owner() -> String {
    "macchrome".to_string()
}

fn default_repo() -> String {
    "winchrome".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_release_name_filter() -> String {
    "ungoogled".to_string()
}

fn default_version_pattern() -> String {
    r"[vM](\d+(?:\.\d+)*)".to_string()
}

fn default_executable_name() -> String {
    if platform::is_windows() {
        "chrome.exe".to_string()
    } else {
        "chrome".to_string()
    }
}

fn default_manifest_extension() -> String {
    "manifest".to_string()
}

fn default_record_file_name() -> String {
    "github_asset_info".to_string()
}

fn default_archive_file_name() -> String {
    "zipped_tmp.7z".to_string()
}

fn default_task_name() -> String {
    "Ungoogled Chromium Updater".to_string()
}

fn default_daily_time() -> String {
    "00:00".to_string()
}

fn default_user_agent() -> String {
    format!("chromium-updater/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_dir: platform::default_install_dir(),
            owner: default_owner(),
            repo: default_repo(),
            api_base_url: default_api_base_url(),
            release_name_filter: default_release_name_filter(),
            asset_suffix: platform::default_asset_suffix(),
            version_pattern: default_version_pattern(),
            executable_name: default_executable_name(),
            manifest_extension: default_manifest_extension(),
            archive_tool: None,
            record_file_name: default_record_file_name(),
            archive_file_name: default_archive_file_name(),
            task_name: default_task_name(),
            daily_time: default_daily_time(),
            user_agent: default_user_agent(),
            github_token: None,
        }
    }
}

impl UpdaterConfig {
    /// Load from an explicit path, the env override, or the default location.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path),
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(value) => Some(PathBuf::from(value)),
                None => Self::default_path(),
            },
        };

        let mut config = match path {
            Some(path) if path.exists() => Self::load_from(&path).await?,
            Some(path) => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        if config.github_token.is_none() {
            config.github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Parse, expand and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| UpdaterError::ConfigError {
            message: e.to_string(),
        })?;
        config.install_dir = expand_path(&config.install_dir)?;
        if let Some(tool) = &config.archive_tool {
            config.archive_tool = Some(expand_path(tool)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/chromium-updater/config.toml`, when a config dir exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chromium-updater").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.version_regex()?;
        parse_daily_time(&self.daily_time)?;
        for (key, value) in [
            ("executable_name", &self.executable_name),
            ("record_file_name", &self.record_file_name),
            ("archive_file_name", &self.archive_file_name),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(UpdaterError::ConfigError {
                    message: format!("{key} must be a plain file name, got '{value}'"),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Compile `version_pattern`, requiring at least one capture group.
    pub fn version_regex(&self) -> Result<Regex> {
        let regex = Regex::new(&self.version_pattern).map_err(|e| UpdaterError::ConfigError {
            message: format!("invalid version_pattern: {e}"),
        })?;
        if regex.captures_len() < 2 {
            return Err(UpdaterError::ConfigError {
                message: format!(
                    "version_pattern '{}' needs a capture group for the version",
                    self.version_pattern
                ),
            }
            .into());
        }
        Ok(regex)
    }

    #[must_use]
    pub fn with_install_dir(mut self, install_dir: PathBuf) -> Self {
        self.install_dir = install_dir;
        self
    }

    #[must_use]
    pub fn executable_path(&self) -> PathBuf {
        self.install_dir.join(&self.executable_name)
    }

    #[must_use]
    pub fn record_path(&self) -> PathBuf {
        self.install_dir.join(&self.record_file_name)
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.install_dir.join(&self.archive_file_name)
    }
}

/// Parse `HH:MM` into hour and minute.
pub fn parse_daily_time(value: &str) -> Result<(u8, u8)> {
    let invalid = || UpdaterError::ConfigError {
        message: format!("daily_time must be HH:MM, got '{value}'"),
    };
    let (hour, minute) = value.split_once(':').ok_or_else(invalid)?;
    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid().into());
    }
    Ok((hour, minute))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| UpdaterError::ConfigError {
        message: format!("cannot expand path '{raw}': {e}"),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
