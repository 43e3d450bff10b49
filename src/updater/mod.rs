//! Update cycle orchestration.
//!
//! One call to [`UpdateOrchestrator::run`] performs one update cycle:
//!
//! ```text
//! Idle
//!  └─ CheckingRunning ── browser live ───────────────────────────► Failed
//!      └─ CheckingVersion ── installed id == latest id ──────────► UpToDate
//!          └─ Downloading
//!              └─ Verifying ── no <version>.manifest entry ──────► Failed
//!                  └─ Extracting ── extractor exits non-zero ────► Failed
//!                      └─ Swapping
//!                          └─ RecordingVersion
//!                              └─ Done
//! ```
//!
//! The version record is written only after the swap returns, so it always
//! describes what is actually installed. The downloaded archive is removed
//! whether the cycle succeeds or fails. Nothing is retried; the next scheduled
//! run is the retry.

mod self_install;

pub use self_install::{
    INSTALLER_FILE_NAME, InstalledUpdater, WINDOWED_INSTALLER_FILE_NAME, install_updater_binary,
    scheduled_program_in,
};

use crate::archive::{ArchiveInspector, ArchiveTool, SevenZip};
use crate::config::UpdaterConfig;
use crate::core::UpdaterError;
use crate::install::{
    InstallDirectoryReplacer, InstalledVersionRecord, LOCK_FILE_NAME, UpdateLock, compute_sha256,
};
use crate::process::{ProcessGuard, ProcessInspector, SystemProcessInspector};
use crate::release::{GithubReleaseIndex, LatestRelease, ReleaseIndex, SelectionCriteria};
use crate::utils::fs::{remove_dir_all, remove_file_if_exists};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where an update cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    CheckingRunning,
    CheckingVersion,
    UpToDate,
    Downloading,
    Verifying,
    Extracting,
    Swapping,
    RecordingVersion,
    Done,
    Failed,
}

impl UpdateState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::UpToDate | Self::Done | Self::Failed)
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckingRunning => "checking for running instances",
            Self::CheckingVersion => "checking version",
            Self::UpToDate => "up to date",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying archive",
            Self::Extracting => "extracting",
            Self::Swapping => "replacing install directory",
            Self::RecordingVersion => "recording version",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed release is already the newest.
    UpToDate {
        release_id: u64,
        version: String,
    },
    /// A new release was installed.
    Updated {
        previous_release_id: u64,
        record: InstalledVersionRecord,
    },
}

/// Drives one update cycle against an install directory.
pub struct UpdateOrchestrator {
    config: UpdaterConfig,
    releases: Arc<dyn ReleaseIndex>,
    guard: ProcessGuard,
    inspector: ArchiveInspector,
    replacer: InstallDirectoryReplacer,
    state: UpdateState,
}

impl UpdateOrchestrator {
    pub fn new(
        config: UpdaterConfig,
        releases: Arc<dyn ReleaseIndex>,
        processes: Arc<dyn ProcessInspector>,
        archive_tool: Arc<dyn ArchiveTool>,
    ) -> Self {
        let inspector = ArchiveInspector::new(archive_tool, config.manifest_extension.clone());
        let replacer = InstallDirectoryReplacer::new(config.install_dir.clone());
        Self {
            config,
            releases,
            guard: ProcessGuard::new(processes),
            inspector,
            replacer,
            state: UpdateState::Idle,
        }
    }

    /// Build an orchestrator with the real release index, process table and
    /// 7-Zip.
    pub fn from_config(config: UpdaterConfig) -> Result<Self> {
        let releases = Arc::new(GithubReleaseIndex::new(&config)?);
        let archive_tool = Arc::new(SevenZip::discover(config.archive_tool.as_deref())?);
        Ok(Self::new(config, releases, Arc::new(SystemProcessInspector), archive_tool))
    }

    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Top-level file names a swap must leave alone.
    #[must_use]
    pub fn sentinel_names(&self) -> HashSet<String> {
        [
            self.config.record_file_name.as_str(),
            self.config.archive_file_name.as_str(),
            LOCK_FILE_NAME,
            INSTALLER_FILE_NAME,
            WINDOWED_INSTALLER_FILE_NAME,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Run one update cycle.
    pub async fn run(&mut self) -> Result<UpdateOutcome> {
        self.state = UpdateState::Idle;
        let result = self.run_cycle().await;
        if let Err(e) = &result {
            debug!("Update failed while {}: {:#}", self.state, e);
            self.state = UpdateState::Failed;
        }
        result
    }

    fn transition(&mut self, next: UpdateState) {
        debug!("Update state: {} -> {}", self.state, next);
        self.state = next;
    }

    async fn run_cycle(&mut self) -> Result<UpdateOutcome> {
        let install_dir = self.config.install_dir.clone();

        self.transition(UpdateState::CheckingRunning);
        self.guard.assert_not_running(&install_dir, &self.config.executable_name).await?;

        let _lock = UpdateLock::acquire(&install_dir).await?;
        let record_path = self.config.record_path();
        if self.replacer.recover_interrupted_swap()? {
            warn!(
                "Install directory {} may contain a partial update; forcing a reinstall",
                install_dir.display()
            );
            InstalledVersionRecord::remove(&record_path)?;
        }

        self.transition(UpdateState::CheckingVersion);
        let criteria = SelectionCriteria::from_config(&self.config)?;
        let latest = self.releases.latest(&criteria).await?;
        let installed = InstalledVersionRecord::load(&record_path)?;
        let installed_id = installed.as_ref().map_or(0, |record| record.release_id);
        info!(
            "Latest release is {} (id {}), installed id is {}",
            latest.version, latest.release_id, installed_id
        );

        if installed.as_ref().is_some_and(|record| record.is_current(&latest)) {
            self.transition(UpdateState::UpToDate);
            info!("Already up to date ({})", latest.version);
            return Ok(UpdateOutcome::UpToDate {
                release_id: latest.release_id,
                version: latest.version,
            });
        }

        let archive = self.config.archive_path();
        let result = self.install_release(&latest, &archive).await;
        if let Err(e) = remove_file_if_exists(&archive) {
            warn!("Failed to remove downloaded archive {}: {:#}", archive.display(), e);
        }
        let record = result?;

        self.transition(UpdateState::Done);
        info!("Updated to {} (release id {})", record.tag_version, record.release_id);
        Ok(UpdateOutcome::Updated {
            previous_release_id: installed_id,
            record,
        })
    }

    async fn install_release(
        &mut self,
        latest: &LatestRelease,
        archive: &Path,
    ) -> Result<InstalledVersionRecord> {
        self.transition(UpdateState::Downloading);
        remove_file_if_exists(archive)?;
        let bytes = self.releases.download(&latest.asset.download_url, archive).await?;
        info!("Downloaded {} ({} bytes)", latest.asset.name, bytes);

        self.transition(UpdateState::Verifying);
        let payload_root = self
            .inspector
            .locate_payload_root(archive, &latest.version)
            .await?
            .ok_or_else(|| UpdaterError::CorruptArchive {
                archive: archive.display().to_string(),
                reason: format!(
                    "no {}.{} entry below a top-level directory",
                    latest.version, self.config.manifest_extension
                ),
            })?;
        let archive_sha256 = compute_sha256(archive).await?;

        self.transition(UpdateState::Extracting);
        let staging = self.replacer.create_staging_dir()?;
        let payload = match self.extract_payload(archive, &staging, &payload_root).await {
            Ok(payload) => payload,
            Err(e) => {
                if let Err(cleanup) = remove_dir_all(&staging) {
                    warn!("Failed to remove staging directory {}: {:#}", staging.display(), cleanup);
                }
                return Err(e);
            }
        };

        self.transition(UpdateState::Swapping);
        self.replacer.swap(&payload, &self.sentinel_names())?;

        self.transition(UpdateState::RecordingVersion);
        let record = InstalledVersionRecord::from_release(latest, Some(archive_sha256));
        record.save(&self.config.record_path())?;
        Ok(record)
    }

    async fn extract_payload(
        &self,
        archive: &Path,
        staging: &Path,
        payload_root: &Path,
    ) -> Result<PathBuf> {
        self.inspector.tool().extract(archive, staging).await?;

        let payload = staging.join(payload_root);
        if !payload.is_dir() {
            return Err(UpdaterError::directory_state(
                &payload,
                "payload root listed in the archive was not extracted",
            )
            .into());
        }

        let resolved_staging = staging
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", staging.display()))?;
        let resolved_payload = payload
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", payload.display()))?;
        let inside_staging = resolved_payload
            .strip_prefix(&resolved_staging)
            .is_ok_and(|relative| relative.components().next().is_some());
        if !inside_staging {
            return Err(UpdaterError::directory_state(
                &payload,
                "payload root resolves outside the extraction directory",
            )
            .into());
        }
        Ok(payload)
    }
}
