//! Placing the updater binaries next to the browser they maintain.
//!
//! Two builds of the same command line ship together: the console binary for
//! manual runs and a windowless one for scheduled runs. Both are copied into
//! the install directory, and the windowless copy is the one registered.

use crate::utils::fs::ensure_dir;
use crate::utils::platform::{canonicalize_or_self, paths_equal};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// File name of the console updater inside the install directory.
pub const INSTALLER_FILE_NAME: &str =
    if cfg!(windows) { "chromium-updater.exe" } else { "chromium-updater" };

/// File name of the windowless updater inside the install directory.
pub const WINDOWED_INSTALLER_FILE_NAME: &str =
    if cfg!(windows) { "chromium-updater-w.exe" } else { "chromium-updater-w" };

/// Updater copies inside an install directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledUpdater {
    pub console: PathBuf,
    pub windowed: Option<PathBuf>,
}

impl InstalledUpdater {
    /// The program recurring registrations should start.
    #[must_use]
    pub fn scheduled_program(&self) -> &Path {
        self.windowed.as_deref().unwrap_or(&self.console)
    }
}

/// Program a registration for `install_dir` points at.
#[must_use]
pub fn scheduled_program_in(install_dir: &Path) -> PathBuf {
    install_dir.join(WINDOWED_INSTALLER_FILE_NAME)
}

/// Copy the updater binaries that sit next to `current_exe` into
/// `install_dir`.
///
/// The console binary is taken from its sibling when present, otherwise
/// `current_exe` itself is used. The windowless sibling is copied when it
/// exists; without it the console copy is what gets scheduled. Both copies
/// are sentinels of every swap, so scheduled runs keep working after the
/// payload is replaced.
pub async fn install_updater_binary(current_exe: &Path, install_dir: &Path) -> Result<InstalledUpdater> {
    ensure_dir(install_dir)?;
    let bin_dir = current_exe.parent().unwrap_or_else(|| Path::new("."));

    let console_source = bin_dir.join(INSTALLER_FILE_NAME);
    let console_source = if console_source.is_file() { console_source } else { current_exe.to_path_buf() };
    let console = copy_binary(&console_source, &install_dir.join(INSTALLER_FILE_NAME)).await?;

    let windowed_source = bin_dir.join(WINDOWED_INSTALLER_FILE_NAME);
    let windowed = if windowed_source.is_file() {
        Some(copy_binary(&windowed_source, &install_dir.join(WINDOWED_INSTALLER_FILE_NAME)).await?)
    } else {
        warn!(
            "No {} next to {}; scheduled runs will use the console updater",
            WINDOWED_INSTALLER_FILE_NAME,
            current_exe.display()
        );
        None
    };

    Ok(InstalledUpdater {
        console,
        windowed,
    })
}

/// Copy `source` to `destination`; copying a binary onto itself is a no-op.
async fn copy_binary(source: &Path, destination: &Path) -> Result<PathBuf> {
    if paths_equal(&canonicalize_or_self(source), &canonicalize_or_self(destination)) {
        debug!("Updater already runs from {}", destination.display());
        return Ok(destination.to_path_buf());
    }

    info!("Installing updater to {}", destination.display());
    fs::copy(source, destination).await.with_context(|| {
        format!("Failed to copy {} to {}", source.display(), destination.display())
    })?;

    #[cfg(unix)]
    {
        let permissions = fs::metadata(source)
            .await
            .context("Failed to read updater permissions")?
            .permissions();
        fs::set_permissions(destination, permissions)
            .await
            .context("Failed to set updater permissions")?;
    }

    Ok(destination.to_path_buf())
}
