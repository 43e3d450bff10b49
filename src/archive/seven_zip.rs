//! 7-Zip command-line driver.

use super::ArchiveTool;
use crate::core::UpdaterError;
use crate::utils::command::{ToolCommand, ToolOutput};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executable names probed on `PATH`, in order.
const PATH_CANDIDATES: &[&str] = &["7z", "7za", "7zz"];

const LIST_TIMEOUT: Duration = Duration::from_secs(120);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(900);

/// [`ArchiveTool`] backed by the 7-Zip command-line program.
///
/// Lists with `7z l <archive>` and extracts with `7z x <archive> -o<dir> -y`.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
}

impl SevenZip {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate a 7-Zip executable.
    ///
    /// An explicitly configured path wins and must exist. Otherwise `PATH` is
    /// searched for `7z`, `7za` and `7zz`, then the default Windows install
    /// locations under `%ProgramFiles%`.
    pub fn discover(configured: Option<&Path>) -> Result<Self> {
        let mut searched = Vec::new();

        if let Some(path) = configured {
            if path.is_file() {
                return Ok(Self::new(path));
            }
            searched.push(path.display().to_string());
            return Err(UpdaterError::ArchiveToolNotFound {
                searched,
            }
            .into());
        }

        for name in PATH_CANDIDATES {
            if let Ok(path) = which::which(name) {
                tracing::debug!(target: "archive", "Found {} at {}", name, path.display());
                return Ok(Self::new(path));
            }
            searched.push(format!("{name} (PATH)"));
        }

        for var in ["ProgramFiles", "ProgramW6432", "ProgramFiles(x86)"] {
            let Some(base) = std::env::var_os(var) else {
                continue;
            };
            let candidate = PathBuf::from(base).join("7-Zip").join("7z.exe");
            if candidate.is_file() {
                return Ok(Self::new(candidate));
            }
            searched.push(candidate.display().to_string());
        }

        Err(UpdaterError::ArchiveToolNotFound {
            searched,
        }
        .into())
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn list_command(&self, archive: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .arg("l")
            .arg(archive.display().to_string())
            .timeout(LIST_TIMEOUT)
            .with_context("Listing archive")
    }

    fn extract_command(&self, archive: &Path, out_dir: &Path) -> ToolCommand {
        ToolCommand::new(&self.program)
            .arg("x")
            .arg(archive.display().to_string())
            .arg(format!("-o{}", out_dir.display()))
            .arg("-y")
            .timeout(EXTRACT_TIMEOUT)
            .with_context("Extracting archive")
    }
}

#[async_trait]
impl ArchiveTool for SevenZip {
    async fn list(&self, archive: &Path) -> Result<String> {
        let output = self.list_command(archive).execute().await?;
        if !output.success {
            return Err(UpdaterError::CorruptArchive {
                archive: archive.display().to_string(),
                reason: failure_reason(&output),
            }
            .into());
        }
        Ok(output.stdout)
    }

    async fn extract(&self, archive: &Path, out_dir: &Path) -> Result<()> {
        let output = self.extract_command(archive, out_dir).execute().await?;
        if !output.success {
            return Err(UpdaterError::ExtractionError {
                archive: archive.display().to_string(),
                stderr: failure_reason(&output),
            }
            .into());
        }
        Ok(())
    }
}

fn failure_reason(output: &ToolOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit status {}", output.code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))
    } else {
        stderr.to_string()
    }
}
