//! Directory operations for creating, copying, moving and removing entries.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Create `path` and any missing parents. Errors if it exists as a file.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let safe_path = crate::utils::platform::windows_long_path(path);

    if !safe_path.exists() {
        fs::create_dir_all(&safe_path).with_context(|| {
            let platform_help = if crate::utils::platform::is_windows() {
                "On Windows: Check that the path length is < 260 chars or that long path support is enabled"
            } else {
                "Check directory permissions and path validity"
            };

            format!("Failed to create directory: {}\n\n{}", path.display(), platform_help)
        })?;
    } else if !safe_path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Recursively copy the contents of `src` into `dst`, overwriting files that
/// already exist at the destination.
///
/// Symlinks and other special entries are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }

    Ok(())
}

/// Remove a directory tree; a missing directory is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to remove directory: {}", path.display()))
        }
    }
}

/// Remove a file; a missing file is not an error.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

/// Move `src` to `dst`, replacing whatever is at `dst`.
///
/// Tries a rename first. When the rename fails (different volume, or the
/// platform refuses), falls back to copy followed by removal of `src`.
pub fn move_entry(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(dst);
    if let Ok(meta) = meta {
        if meta.is_dir() {
            remove_dir_all(dst)?;
        } else {
            remove_file_if_exists(dst)?;
        }
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename {} -> {} failed ({}), copying instead", src.display(), dst.display(), e);
            if src.is_dir() {
                copy_dir(src, dst)?;
                remove_dir_all(src)
            } else {
                fs::copy(src, dst).with_context(|| {
                    format!("Failed to copy file from {} to {}", src.display(), dst.display())
                })?;
                remove_file_if_exists(src)
            }
        }
    }
}
