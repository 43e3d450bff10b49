//! Cross-process exclusion for update cycles.

use crate::core::UpdaterError;
use crate::utils::fs::ensure_dir;
use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file kept in the install directory.
pub const LOCK_FILE_NAME: &str = ".updater.lock";

/// Exclusive advisory lock on `<install_dir>/.updater.lock`.
///
/// Held for the whole update cycle and released on drop. Acquisition does not
/// wait: if another updater holds the lock the attempt fails immediately with
/// [`UpdaterError::UpdateInProgress`]. The file itself is left in place.
#[derive(Debug)]
pub struct UpdateLock {
    file: File,
    path: PathBuf,
}

impl UpdateLock {
    pub async fn acquire(install_dir: &Path) -> Result<Self> {
        ensure_dir(install_dir)?;
        let path = install_dir.join(LOCK_FILE_NAME);

        let lock_path = path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

            let acquired = file
                .try_lock_exclusive()
                .with_context(|| format!("Failed to lock {}", lock_path.display()))?;
            if !acquired {
                return Err(UpdaterError::UpdateInProgress {
                    path: lock_path.display().to_string(),
                }
                .into());
            }
            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        debug!("Acquired update lock {}", path.display());
        Ok(Self {
            file,
            path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        } else {
            debug!("Released update lock {}", self.path.display());
        }
    }
}
