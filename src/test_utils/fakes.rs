use super::fixtures::listing_for;
use crate::archive::ArchiveTool;
use crate::core::UpdaterError;
use crate::process::{ProcessInspector, ProcessSnapshot};
use crate::release::{ReleaseCandidate, ReleaseIndex};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Release index with a fixed candidate list and a fixed asset body.
#[derive(Debug, Default)]
pub struct FakeReleaseIndex {
    releases: Vec<ReleaseCandidate>,
    body: Vec<u8>,
    fetches: AtomicUsize,
    downloads: AtomicUsize,
}

impl FakeReleaseIndex {
    pub fn new(releases: Vec<ReleaseCandidate>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            releases,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseIndex for FakeReleaseIndex {
    async fn fetch_releases(&self) -> Result<Vec<ReleaseCandidate>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.releases.clone())
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<u64> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(dest, &self.body)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(self.body.len() as u64)
    }
}

/// Archive tool that lists a scripted listing and extracts scripted files.
///
/// Both operations require the archive file to exist, mirroring a real
/// extractor.
#[derive(Debug, Default)]
pub struct FakeArchiveTool {
    listing: String,
    files: Vec<(PathBuf, String)>,
    fail_extract: bool,
    extractions: AtomicUsize,
}

impl FakeArchiveTool {
    pub fn new(listing: impl Into<String>, files: Vec<(PathBuf, String)>) -> Self {
        Self {
            listing: listing.into(),
            files,
            ..Self::default()
        }
    }

    /// A well-formed archive: `root/<version>.manifest` plus `files` under
    /// `root`.
    pub fn for_payload(root: &str, version: &str, files: &[(&str, &str)]) -> Self {
        let mut entries: Vec<(PathBuf, String)> =
            vec![(Path::new(root).join(format!("{version}.manifest")), "<assembly/>".to_string())];
        entries.extend(
            files.iter().map(|(path, content)| (Path::new(root).join(path), (*content).to_string())),
        );
        let names: Vec<String> =
            entries.iter().map(|(path, _)| path.to_string_lossy().replace('\\', "/")).collect();
        Self::new(listing_for(&names), entries)
    }

    /// Make `extract` fail as if the extractor exited non-zero.
    #[must_use]
    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    pub fn extraction_count(&self) -> usize {
        self.extractions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveTool for FakeArchiveTool {
    async fn list(&self, archive: &Path) -> Result<String> {
        if !archive.is_file() {
            return Err(UpdaterError::CorruptArchive {
                archive: archive.display().to_string(),
                reason: "archive does not exist".to_string(),
            }
            .into());
        }
        Ok(self.listing.clone())
    }

    async fn extract(&self, archive: &Path, out_dir: &Path) -> Result<()> {
        self.extractions.fetch_add(1, Ordering::SeqCst);
        if self.fail_extract || !archive.is_file() {
            return Err(UpdaterError::ExtractionError {
                archive: archive.display().to_string(),
                stderr: "ERROR: Data Error".to_string(),
            }
            .into());
        }
        for (relative, content) in &self.files {
            let path = out_dir.join(relative);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, content).await?;
        }
        Ok(())
    }
}

/// Process inspector returning a fixed table.
#[derive(Debug, Default, Clone)]
pub struct StaticProcessInspector {
    processes: Vec<ProcessSnapshot>,
}

impl StaticProcessInspector {
    pub fn new(processes: Vec<ProcessSnapshot>) -> Self {
        Self {
            processes,
        }
    }

    /// A table with one process running `exe`.
    pub fn running(exe: &Path) -> Self {
        let name = exe.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self::new(vec![ProcessSnapshot {
            pid: 4242,
            name,
            exe: Some(exe.to_path_buf()),
        }])
    }
}

impl ProcessInspector for StaticProcessInspector {
    fn snapshot(&self) -> Result<Vec<ProcessSnapshot>> {
        Ok(self.processes.clone())
    }
}
