//! Install directory replacement.
//!
//! A swap turns the install directory into "sentinels + new payload":
//!
//! ```text
//! <install_dir>/
//!   .staging-<uuid>/ungoogled-12.3.0-win64/...   extracted payload
//!   .swap-journal                                 written before any mutation
//!   github_asset_info, zipped_tmp.7z, ...         sentinels, never touched
//!   chrome.exe, locales/, ...                     old payload, removed
//! ```
//!
//! Old entries are removed first, then every payload entry is moved up into
//! the install directory (rename, or copy and delete when renaming fails).
//! The swap is not atomic as a whole. The journal is deleted only after the
//! last step, so a crash anywhere in between leaves it behind and the next
//! run can tell the tree is mixed.

use crate::core::UpdaterError;
use crate::utils::fs::{atomic_write, ensure_dir, move_entry, remove_dir_all, remove_file_if_exists};
use crate::utils::platform::canonicalize_or_self;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Journal file present while a swap is in progress.
pub const SWAP_JOURNAL_NAME: &str = ".swap-journal";

/// Prefix of per-run extraction directories.
pub const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SwapJournal {
    staging_dir: PathBuf,
    payload_root: PathBuf,
    started_at: DateTime<Utc>,
}

/// Replaces the contents of an install directory with an extracted payload.
#[derive(Debug, Clone)]
pub struct InstallDirectoryReplacer {
    install_dir: PathBuf,
}

impl InstallDirectoryReplacer {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
        }
    }

    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.install_dir.join(SWAP_JOURNAL_NAME)
    }

    /// Create a fresh, empty staging directory inside the install directory.
    pub fn create_staging_dir(&self) -> Result<PathBuf> {
        let staging = self.install_dir.join(format!("{STAGING_PREFIX}{}", uuid::Uuid::new_v4()));
        ensure_dir(&staging)?;
        debug!("Created staging directory {}", staging.display());
        Ok(staging)
    }

    /// Replace everything in the install directory except `sentinels` with the
    /// contents of `payload_root`.
    ///
    /// When `payload_root` lives inside the install directory, its top-level
    /// ancestor there (the staging directory) survives the clearing step and is
    /// removed once the payload has been moved out. Sentinel names are matched
    /// against top-level files only; a directory is never a sentinel.
    pub fn swap(&self, payload_root: &Path, sentinels: &HashSet<String>) -> Result<()> {
        if !payload_root.is_dir() {
            return Err(UpdaterError::directory_state(payload_root, "payload root is not a directory").into());
        }
        if !self.install_dir.is_dir() {
            return Err(
                UpdaterError::directory_state(&self.install_dir, "install directory does not exist").into()
            );
        }

        if canonicalize_or_self(&self.install_dir).starts_with(canonicalize_or_self(payload_root)) {
            return Err(UpdaterError::directory_state(
                payload_root,
                "payload root is the install directory or one of its parents",
            )
            .into());
        }

        let container = self.container_of(payload_root)?;
        let journal = SwapJournal {
            staging_dir: container.clone().unwrap_or_else(|| payload_root.to_path_buf()),
            payload_root: payload_root.to_path_buf(),
            started_at: Utc::now(),
        };
        let journal_bytes = serde_json::to_vec_pretty(&journal).context("Failed to serialize swap journal")?;
        atomic_write(&self.journal_path(), &journal_bytes)?;

        info!("Replacing contents of {}", self.install_dir.display());
        self.clear(container.as_deref(), sentinels)?;

        let mut moved = 0usize;
        for entry in read_dir(payload_root)? {
            let entry = entry?;
            let target = self.install_dir.join(entry.file_name());
            move_entry(&entry.path(), &target)?;
            moved += 1;
        }
        debug!("Moved {} payload entries into {}", moved, self.install_dir.display());

        match &container {
            Some(container) => remove_dir_all(container)?,
            None => remove_dir_all(payload_root)?,
        }

        remove_file_if_exists(&self.journal_path())?;
        Ok(())
    }

    /// Clean up after a swap that did not finish.
    ///
    /// Returns `true` when a journal was found, meaning the install directory
    /// may hold a mix of old and new files. Staging directories are removed
    /// either way; without a journal they are just leftovers from an
    /// interrupted extraction.
    pub fn recover_interrupted_swap(&self) -> Result<bool> {
        let journal_path = self.journal_path();
        let interrupted = journal_path.exists();
        if interrupted {
            match fs::read_to_string(&journal_path)
                .ok()
                .and_then(|content| serde_json::from_str::<SwapJournal>(&content).ok())
            {
                Some(journal) => warn!(
                    "Previous update was interrupted while swapping {} (started {})",
                    journal.payload_root.display(),
                    journal.started_at
                ),
                None => warn!("Previous update was interrupted during a swap"),
            }
        }

        if self.install_dir.is_dir() {
            for entry in read_dir(&self.install_dir)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX)
                    && entry.file_type()?.is_dir()
                {
                    debug!("Removing leftover staging directory {}", entry.path().display());
                    remove_dir_all(&entry.path())?;
                }
            }
        }

        remove_file_if_exists(&journal_path)?;
        Ok(interrupted)
    }

    /// The top-level install directory entry that contains `payload_root`,
    /// or `None` when the payload lives elsewhere.
    fn container_of(&self, payload_root: &Path) -> Result<Option<PathBuf>> {
        let Ok(relative) = payload_root.strip_prefix(&self.install_dir) else {
            return Ok(None);
        };
        match relative.components().next() {
            Some(Component::Normal(first)) => Ok(Some(self.install_dir.join(first))),
            _ => Err(UpdaterError::directory_state(
                payload_root,
                "payload root must be below the install directory, not the directory itself",
            )
            .into()),
        }
    }

    fn clear(&self, keep_dir: Option<&Path>, sentinels: &HashSet<String>) -> Result<()> {
        for entry in read_dir(&self.install_dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type()?.is_dir() {
                if keep_dir == Some(path.as_path()) {
                    continue;
                }
                debug!("Removing directory {}", path.display());
                remove_dir_all(&path)?;
            } else {
                if name == SWAP_JOURNAL_NAME || sentinels.contains(&name) {
                    continue;
                }
                debug!("Removing file {}", path.display());
                remove_file_if_exists(&path)?;
            }
        }
        Ok(())
    }
}

fn read_dir(path: &Path) -> Result<fs::ReadDir> {
    fs::read_dir(path).with_context(|| format!("Failed to read directory: {}", path.display()))
}
