//! Running-instance guard.
//!
//! Before touching the install directory the updater makes sure the browser
//! is not running from it. The check is a point-in-time snapshot of the process
//! table, not a lock: a browser started right after the check is not detected.
//!
//! Per-process failures (a process exiting mid-enumeration, an executable path
//! hidden by privilege restrictions) never fail the check; such a process is
//! simply not a match.

use crate::core::UpdaterError;
use crate::utils::platform::{canonicalize_or_self, is_windows, paths_equal};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// One entry of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    /// Base name of the process image.
    pub name: String,
    /// Resolved executable path; `None` when it could not be read.
    pub exe: Option<PathBuf>,
}

/// Enumerates running processes.
pub trait ProcessInspector: Send + Sync {
    /// List running processes. Processes that cannot be inspected are either
    /// omitted or reported with `exe: None`; they never produce an error.
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>>;
}

/// [`ProcessInspector`] over the OS process table via `sysinfo`.
#[derive(Debug, Default)]
pub struct SystemProcessInspector;

impl ProcessInspector for SystemProcessInspector {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
        use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::Always),
        );

        Ok(system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessSnapshot {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                exe: process.exe().map(Path::to_path_buf),
            })
            .collect())
    }
}

/// Refuses to proceed while the target application runs from the install
/// directory.
#[derive(Clone)]
pub struct ProcessGuard {
    inspector: Arc<dyn ProcessInspector>,
}

impl ProcessGuard {
    pub fn new(inspector: Arc<dyn ProcessInspector>) -> Self {
        Self {
            inspector,
        }
    }

    /// Fail with [`UpdaterError::AlreadyRunning`] if any live process's name is
    /// `executable_name` and its executable resolves to
    /// `install_dir/executable_name`.
    pub async fn assert_not_running(&self, install_dir: &Path, executable_name: &str) -> Result<()> {
        let target = canonicalize_or_self(&install_dir.join(executable_name));
        debug!("Checking for running instances of {}", target.display());

        let inspector = Arc::clone(&self.inspector);
        let processes = tokio::task::spawn_blocking(move || inspector.snapshot())
            .await
            .context("Process enumeration task failed")??;

        if let Some(process) = processes.iter().find(|p| is_target(p, executable_name, &target)) {
            return Err(UpdaterError::AlreadyRunning {
                path: process.exe.as_deref().unwrap_or(target.as_path()).display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn is_target(process: &ProcessSnapshot, executable_name: &str, target: &Path) -> bool {
    let name_matches = if is_windows() {
        process.name.eq_ignore_ascii_case(executable_name)
    } else {
        process.name == executable_name
    };
    if !name_matches {
        return false;
    }

    let Some(exe) = &process.exe else {
        trace!("Process {} ({}) has no readable executable path", process.pid, process.name);
        return false;
    };
    paths_equal(&canonicalize_or_self(exe), target)
}
