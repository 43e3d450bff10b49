//! Release discovery.
//!
//! The release index is a list of published builds. Each candidate carries a
//! monotonically increasing `id`; the id, not the version string, decides which
//! build is newest. Selection works like this:
//!
//! ```text
//! all candidates
//!   └── keep names containing the filter (case-insensitive)
//!         └── sort by id, newest first
//!               └── for each: parse version from tag (unparseable => ParseError)
//!                     └── first asset ending in the platform suffix wins
//!                           (none => skip to the next candidate)
//! exhausted => NotFound
//! ```
//!
//! [`select_latest`] is the pure selection step; [`ReleaseIndex`] is the
//! transport seam, implemented over HTTP by [`GithubReleaseIndex`].

mod github;

pub use github::GithubReleaseIndex;

use crate::config::UpdaterConfig;
use crate::core::UpdaterError;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One published build from the release index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    /// Authoritative freshness key; higher is newer.
    pub id: u64,
    /// Display name; the index may omit it.
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<AssetRef>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: u64,
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// The candidate chosen by [`select_latest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRelease {
    pub release_id: u64,
    pub release_name: String,
    pub tag_name: String,
    /// Version parsed from the tag, e.g. `12.3.0`.
    pub version: String,
    pub asset: AssetRef,
}

/// Filters applied when picking the newest usable release.
#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    pub name_filter: String,
    pub asset_suffix: String,
    pub version_pattern: Regex,
}

impl SelectionCriteria {
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        Ok(Self {
            name_filter: config.release_name_filter.clone(),
            asset_suffix: config.asset_suffix.clone(),
            version_pattern: config.version_regex()?,
        })
    }

    fn version_of(&self, tag: &str) -> Option<String> {
        self.version_pattern
            .captures(tag)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Pick the highest-id candidate matching both the name filter and the asset
/// suffix.
///
/// A candidate without a matching asset is skipped. A name-matched candidate
/// whose tag has no version fails the whole selection with
/// [`UpdaterError::ParseError`]. Within a candidate, the highest asset id wins.
pub fn select_latest(
    candidates: &[ReleaseCandidate],
    criteria: &SelectionCriteria,
) -> Result<LatestRelease> {
    let filter = criteria.name_filter.to_lowercase();
    let suffix = criteria.asset_suffix.to_lowercase();

    let mut matching: Vec<&ReleaseCandidate> = candidates
        .iter()
        .filter(|c| c.name.as_deref().unwrap_or_default().to_lowercase().contains(&filter))
        .collect();
    matching.sort_by(|a, b| b.id.cmp(&a.id));

    for candidate in matching {
        let version = criteria.version_of(&candidate.tag_name).ok_or_else(|| {
            UpdaterError::ParseError {
                tag: candidate.tag_name.clone(),
            }
        })?;

        let asset = candidate
            .assets
            .iter()
            .filter(|a| a.name.to_lowercase().ends_with(&suffix))
            .max_by_key(|a| a.id);

        let Some(asset) = asset else {
            debug!("Release {} ({}) has no asset ending in {}, skipping", candidate.id, candidate.tag_name, suffix);
            continue;
        };

        return Ok(LatestRelease {
            release_id: candidate.id,
            release_name: candidate.name.clone().unwrap_or_default(),
            tag_name: candidate.tag_name.clone(),
            version,
            asset: asset.clone(),
        });
    }

    Err(UpdaterError::NotFound {
        filter: criteria.name_filter.clone(),
        suffix: criteria.asset_suffix.clone(),
    }
    .into())
}

/// Source of release candidates and their asset bodies.
#[async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Fetch every release candidate the index lists.
    async fn fetch_releases(&self) -> Result<Vec<ReleaseCandidate>>;

    /// Stream an asset body into `dest`, returning the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Fetch and select the newest usable release.
    async fn latest(&self, criteria: &SelectionCriteria) -> Result<LatestRelease> {
        let releases = self.fetch_releases().await?;
        debug!("Release index returned {} candidates", releases.len());
        select_latest(&releases, criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> SelectionCriteria {
        SelectionCriteria {
            name_filter: "ungoogled".to_string(),
            asset_suffix: "win64.7z".to_string(),
            version_pattern: Regex::new(r"[vM](\d+(?:\.\d+)*)").unwrap(),
        }
    }

    fn asset(id: u64, name: &str) -> AssetRef {
        AssetRef {
            id,
            name: name.to_string(),
            download_url: format!("https://example.invalid/{name}"),
        }
    }

    fn release(id: u64, name: &str, tag: &str, assets: Vec<AssetRef>) -> ReleaseCandidate {
        ReleaseCandidate {
            id,
            name: Some(name.to_string()),
            tag_name: tag.to_string(),
            assets,
        }
    }

    #[test]
    fn test_selects_highest_id_not_highest_version() {
        let candidates = vec![
            release(100, "Ungoogled Chromium 99", "v99.0.0", vec![asset(1, "uc-win64.7z")]),
            release(500, "Ungoogled Chromium 12", "v12.3.0", vec![asset(2, "uc-win64.7z")]),
        ];

        let latest = select_latest(&candidates, &criteria()).unwrap();
        assert_eq!(latest.release_id, 500);
        assert_eq!(latest.version, "12.3.0");
    }

    #[test]
    fn test_skips_newer_candidate_without_matching_asset() {
        let candidates = vec![
            release(600, "ungoogled 13", "v13.0.0", vec![asset(3, "uc-win32.7z")]),
            release(500, "ungoogled 12", "v12.3.0", vec![asset(2, "uc-win64.7z")]),
        ];

        let latest = select_latest(&candidates, &criteria()).unwrap();
        assert_eq!(latest.release_id, 500);
    }

    #[test]
    fn test_name_filter_excludes_other_builds() {
        let candidates = vec![
            release(700, "Chromium (Google services)", "v14.0.0", vec![asset(4, "c-win64.7z")]),
            release(500, "UNGOOGLED build", "v12.3.0", vec![asset(2, "uc-WIN64.7z")]),
        ];

        let latest = select_latest(&candidates, &criteria()).unwrap();
        assert_eq!(latest.release_id, 500);
        assert_eq!(latest.asset.name, "uc-WIN64.7z");
    }

    #[test]
    fn test_highest_asset_id_wins() {
        let candidates = vec![release(
            500,
            "ungoogled",
            "v12.3.0",
            vec![asset(10, "old-win64.7z"), asset(12, "new-win64.7z"), asset(11, "mid-win64.7z")],
        )];

        let latest = select_latest(&candidates, &criteria()).unwrap();
        assert_eq!(latest.asset.id, 12);
    }

    #[test]
    fn test_unparseable_tag_is_parse_error() {
        let candidates =
            vec![release(500, "ungoogled", "nightly", vec![asset(2, "uc-win64.7z")])];

        let err = select_latest(&candidates, &criteria()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpdaterError>(),
            Some(UpdaterError::ParseError { tag }) if tag == "nightly"
        ));
    }

    #[test]
    fn test_exhausted_list_is_not_found() {
        let candidates = vec![release(500, "ungoogled", "v12.3.0", vec![asset(2, "uc-win32.7z")])];

        let err = select_latest(&candidates, &criteria()).unwrap_err();
        assert!(matches!(err.downcast_ref::<UpdaterError>(), Some(UpdaterError::NotFound { .. })));

        let err = select_latest(&[], &criteria()).unwrap_err();
        assert!(matches!(err.downcast_ref::<UpdaterError>(), Some(UpdaterError::NotFound { .. })));
    }

    #[test]
    fn test_candidate_without_name_is_filtered_out() {
        let candidates = vec![ReleaseCandidate {
            id: 900,
            name: None,
            tag_name: "v15.0.0".to_string(),
            assets: vec![asset(9, "uc-win64.7z")],
        }];

        assert!(select_latest(&candidates, &criteria()).is_err());
    }

    #[test]
    fn test_deserializes_index_records() {
        let json = r#"[{
            "id": 500,
            "name": "Ungoogled Chromium",
            "tag_name": "v12.3.0",
            "draft": false,
            "assets": [{
                "id": 7,
                "name": "ungoogled-12.3.0-win64.7z",
                "size": 1024,
                "browser_download_url": "https://example.invalid/a.7z"
            }]
        }]"#;

        let releases: Vec<ReleaseCandidate> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].assets[0].download_url, "https://example.invalid/a.7z");
    }
}
