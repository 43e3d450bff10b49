//! Persisted record of the last successfully installed release.

use crate::release::LatestRelease;
use crate::utils::fs::{atomic_write, remove_file_if_exists};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// What is installed right now.
///
/// Written only after a swap has completed, so the record never describes a
/// build that was downloaded but not installed. `release_id` is the only field
/// consulted when deciding whether an update is needed; the rest is metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledVersionRecord {
    pub release_id: u64,
    #[serde(default)]
    pub release_name: String,
    #[serde(default)]
    pub tag_name: String,
    pub tag_version: String,
    #[serde(default)]
    pub asset_id: u64,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub download_url: String,
    /// `sha256:<hex>` of the archive that was installed. Not verified.
    #[serde(default)]
    pub archive_sha256: Option<String>,
    pub installed_at: DateTime<Utc>,
}

impl InstalledVersionRecord {
    pub fn from_release(release: &LatestRelease, archive_sha256: Option<String>) -> Self {
        Self {
            release_id: release.release_id,
            release_name: release.release_name.clone(),
            tag_name: release.tag_name.clone(),
            tag_version: release.version.clone(),
            asset_id: release.asset.id,
            asset_name: release.asset.name.clone(),
            download_url: release.asset.download_url.clone(),
            archive_sha256,
            installed_at: Utc::now(),
        }
    }

    /// Whether this record describes `latest`.
    ///
    /// Release ids decide. Records migrated from the legacy layout carry only
    /// an asset id, which is compared instead.
    #[must_use]
    pub fn is_current(&self, latest: &LatestRelease) -> bool {
        if self.release_id == 0 {
            return self.asset_id != 0 && self.asset_id == latest.asset.id;
        }
        self.release_id == latest.release_id
    }

    /// Read the record at `path`.
    ///
    /// A missing file is `Ok(None)`. The legacy layout (the raw asset object
    /// plus `release_version`) is migrated on read. A file that cannot be read
    /// or parsed is logged and also reported as `Ok(None)`, so a damaged
    /// record leads to a reinstall instead of failing every run.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No version record at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                warn!("Ignoring unreadable version record {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => match serde_json::from_str::<LegacyAssetRecord>(&content) {
                Ok(legacy) => {
                    info!(
                        "Read legacy version record {} (asset id {}, version {})",
                        path.display(),
                        legacy.id,
                        legacy.release_version
                    );
                    Ok(Some(legacy.into()))
                }
                Err(_) => {
                    warn!(
                        "Ignoring corrupt version record {}, the latest release will be reinstalled: {}",
                        path.display(),
                        e
                    );
                    Ok(None)
                }
            },
        }
    }

    /// The installed release id, `0` when nothing valid is recorded.
    pub fn installed_release_id(path: &Path) -> Result<u64> {
        Ok(Self::load(path)?.map_or(0, |record| record.release_id))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize version record")?;
        atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write version record {}", path.display()))
    }

    /// Delete the record at `path`; a missing record is not an error.
    pub fn remove(path: &Path) -> Result<()> {
        remove_file_if_exists(path)
    }
}

/// Version record layout of earlier updaters: the GitHub asset object that
/// was installed, with the parsed version added.
#[derive(Debug, Deserialize)]
struct LegacyAssetRecord {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    browser_download_url: String,
    release_version: String,
}

impl From<LegacyAssetRecord> for InstalledVersionRecord {
    fn from(legacy: LegacyAssetRecord) -> Self {
        Self {
            release_id: 0,
            release_name: String::new(),
            tag_name: String::new(),
            tag_version: legacy.release_version,
            asset_id: legacy.id,
            asset_name: legacy.name,
            download_url: legacy.browser_download_url,
            archive_sha256: None,
            installed_at: DateTime::<Utc>::default(),
        }
    }
}

/// Stream `path` through SHA-256, returning `sha256:<lowercase hex>`.
pub async fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("sha256:{:x}", hasher.finalize()))
}
