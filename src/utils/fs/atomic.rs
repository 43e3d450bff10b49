//! Atomic file write operations using temp-and-rename strategy.
//!
//! Used for every small state file the updater keeps in the install directory,
//! so a crash mid-write never leaves a truncated version record behind.

use crate::utils::fs::dirs::ensure_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Write `content` to a sibling temp file, sync it, then rename over `path`.
///
/// Parent directories are created as needed. The temp file carries a `.tmp`
/// extension next to the target.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    let safe_path = crate::utils::platform::windows_long_path(path);

    if let Some(parent) = safe_path.parent() {
        ensure_dir(parent)?;
    }

    let mut temp_name = safe_path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = safe_path.with_file_name(temp_name);

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!("Failed to create temp file: {}", temp_path.display())
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, &safe_path)
        .with_context(|| format!("Failed to rename temp file to: {}", safe_path.display()))?;

    Ok(())
}
