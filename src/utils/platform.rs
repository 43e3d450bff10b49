//! Platform-specific helpers.
//!
//! The updater primarily targets Windows builds of the browser, but every
//! component also runs on Unix-like hosts so the whole update cycle can be
//! exercised in tests. Differences handled here:
//!
//! - Path comparison (case-insensitive on Windows)
//! - Long path prefixes on Windows
//! - The platform-specific archive asset suffix and default install location

use std::path::{Path, PathBuf};

#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Whether the host CPU architecture is 64-bit.
///
/// Asks the OS rather than using the compile target, so a 32-bit build on a
/// 64-bit host still picks the 64-bit browser.
#[must_use]
pub fn is_64_bit() -> bool {
    arch_is_64_bit(&host_arch())
}

/// Host CPU architecture name as the OS reports it.
#[must_use]
pub fn host_arch() -> String {
    // A 32-bit process under WOW64 sees its own architecture everywhere except here.
    if is_windows() {
        if let Ok(native) = std::env::var("PROCESSOR_ARCHITEW6432") {
            return native;
        }
    }
    sysinfo::System::cpu_arch()
}

/// `x86_64`, `aarch64`, `AMD64`, `ARM64` and friends; anything else is 32-bit.
#[must_use]
pub fn arch_is_64_bit(arch: &str) -> bool {
    arch.ends_with("64")
}

/// Archive asset suffix for the host: `win64.7z` or `win32.7z`.
#[must_use]
pub fn default_asset_suffix() -> String {
    if is_64_bit() {
        "win64.7z".to_string()
    } else {
        "win32.7z".to_string()
    }
}

/// Default install location.
///
/// `%PROGRAMDATA%\Ungoogled Chromium` on Windows, otherwise
/// `<data_local_dir>/ungoogled-chromium`.
#[must_use]
pub fn default_install_dir() -> PathBuf {
    if is_windows() {
        let program_data =
            std::env::var_os("PROGRAMDATA").map_or_else(|| PathBuf::from(r"C:\ProgramData"), PathBuf::from);
        program_data.join("Ungoogled Chromium")
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ungoogled-chromium")
    }
}

/// Compare two paths the way the host file system does.
///
/// Trailing separators are ignored, and Windows comparisons are
/// case-insensitive with `/` and `\` treated alike.
#[must_use]
pub fn paths_equal(path1: &Path, path2: &Path) -> bool {
    if is_windows() {
        let p1 = path1.to_string_lossy().replace('/', "\\");
        let p2 = path2.to_string_lossy().replace('/', "\\");
        p1.trim_end_matches('\\').to_lowercase() == p2.trim_end_matches('\\').to_lowercase()
    } else {
        let p1 = path1.to_string_lossy();
        let p2 = path2.to_string_lossy();
        p1.trim_end_matches('/') == p2.trim_end_matches('/')
    }
}

/// Canonicalize when possible, otherwise return the path unchanged.
///
/// Used for comparisons where the path may not exist (yet).
#[must_use]
pub fn canonicalize_or_self(path: &Path) -> PathBuf {
    strip_verbatim_prefix(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}

/// Strip the `\\?\` verbatim prefix Windows canonicalization adds, so
/// canonical paths compare equal to the ones processes report.
fn strip_verbatim_prefix(path: PathBuf) -> PathBuf {
    let stripped = {
        let as_str = path.to_string_lossy();
        as_str
            .strip_prefix(r"\\?\")
            .filter(|rest| !rest.starts_with("UNC\\"))
            .map(PathBuf::from)
    };
    stripped.unwrap_or(path)
}

#[cfg(windows)]
pub fn windows_long_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if path_str.len() > 260 && !path_str.starts_with(r"\\?\") {
        let absolute_path = if path.is_relative() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join(path)
        } else {
            path.to_path_buf()
        };

        let absolute_str = absolute_path.to_string_lossy();
        if absolute_str.len() > 260 {
            if let Some(stripped) = absolute_str.strip_prefix(r"\\") {
                PathBuf::from(format!(r"\\?\UNC\{}", stripped))
            } else {
                PathBuf::from(format!(r"\\?\{}", absolute_str))
            }
        } else {
            absolute_path
        }
    } else {
        path.to_path_buf()
    }
}

/// No-op on platforms without the 260-character path limit.
#[cfg(not(windows))]
#[must_use]
pub fn windows_long_path(path: &Path) -> PathBuf {
    path.to_path_buf()
}
