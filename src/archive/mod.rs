//! Archive inspection and extraction.
//!
//! Release archives contain a single top-level directory whose name changes
//! with every build (for example `ungoogled-12.3.0-win64`). Rather than guess
//! it, the updater lists the archive and looks for the manifest entry named
//! after the expected version (`12.3.0.manifest`); that entry's parent
//! directory is the payload root. Listing is metadata-only, so a wrong or
//! truncated download is rejected before anything is extracted.
//!
//! # Listing format
//!
//! The listing is line-oriented text. Column layouts differ across 7-Zip
//! versions, so no column count is assumed: the path is taken to be the final
//! whitespace-delimited field of each line.

mod seven_zip;

pub use seven_zip::SevenZip;

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// External archiver capability.
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// List the archive's entries without extracting anything.
    async fn list(&self, archive: &Path) -> Result<String>;

    /// Extract the whole archive into `out_dir`, overwriting existing files.
    async fn extract(&self, archive: &Path, out_dir: &Path) -> Result<()>;
}

/// Locates and validates the payload root of a downloaded archive.
#[derive(Clone)]
pub struct ArchiveInspector {
    tool: Arc<dyn ArchiveTool>,
    manifest_extension: String,
}

impl ArchiveInspector {
    pub fn new(tool: Arc<dyn ArchiveTool>, manifest_extension: impl Into<String>) -> Self {
        Self {
            tool,
            manifest_extension: manifest_extension.into(),
        }
    }

    #[must_use]
    pub fn tool(&self) -> &Arc<dyn ArchiveTool> {
        &self.tool
    }

    /// List `archive` and return the payload root for `expected_version`, or
    /// `None` when no matching manifest entry exists.
    pub async fn locate_payload_root(
        &self,
        archive: &Path,
        expected_version: &str,
    ) -> Result<Option<PathBuf>> {
        let listing = self.tool.list(archive).await?;
        let root = find_payload_root(&listing, expected_version, &self.manifest_extension);
        match &root {
            Some(root) => debug!("Payload root for {} is {}", expected_version, root.display()),
            None => debug!("No {}.{} entry in archive listing", expected_version, self.manifest_extension),
        }
        Ok(root)
    }
}

/// Scan a listing for `<expected_version>.<manifest_extension>` below at least
/// one directory and return that entry's parent path.
///
/// Both `/` and `\` are accepted as separators. A manifest at the archive top
/// level is ignored even when its name matches. Entries that could resolve
/// outside the extraction directory (absolute paths, drive prefixes, `.` or
/// `..` components) never match. The first match wins.
#[must_use]
pub fn find_payload_root(
    listing: &str,
    expected_version: &str,
    manifest_extension: &str,
) -> Option<PathBuf> {
    let suffix = format!(".{}", manifest_extension.to_lowercase());

    listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|field| field.to_lowercase().ends_with(&suffix))
        .find_map(|field| {
            if field.starts_with(['/', '\\']) {
                debug!("Ignoring absolute archive entry {}", field);
                return None;
            }
            let components: Vec<&str> =
                field.split(['/', '\\']).filter(|c| !c.is_empty()).collect();
            let (file_name, parents) = components.split_last()?;
            let stem = file_name.get(..file_name.len().checked_sub(suffix.len())?)?;
            if parents.is_empty() || stem != expected_version {
                return None;
            }
            if !parents.iter().all(|c| is_plain_component(c)) {
                debug!("Ignoring archive entry outside the extraction root: {}", field);
                return None;
            }
            Some(parents.iter().collect::<PathBuf>())
        })
}

/// A directory name that stays inside its parent on every platform.
fn is_plain_component(component: &str) -> bool {
    component != "." && component != ".." && !component.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
7-Zip 23.01 (x64) : Copyright (c) 1999-2023 Igor Pavlov : 2023-06-20

Scanning the drive for archives:
1 file, 104857600 bytes (100 MiB)

Listing archive: zipped_tmp.7z

--
Path = zipped_tmp.7z
Type = 7z

   Date      Time    Attr         Size   Compressed  Name
------------------- ----- ------------ ------------  ------------------------
2024-03-01 10:00:00 D....            0            0  ungoogled-12.3.0-win64
2024-03-01 10:00:00 ....A          412               ungoogled-12.3.0-win64\\12.3.0.manifest
2024-03-01 10:00:00 ....A      2342912     98000000  ungoogled-12.3.0-win64\\chrome.exe
------------------- ----- ------------ ------------  ------------------------
2024-03-01 10:00:00          2343324     98000000  2 files, 1 folders
";

    #[test]
    fn test_finds_payload_root_in_7z_listing() {
        let root = find_payload_root(LISTING, "12.3.0", "manifest");
        assert_eq!(root, Some(PathBuf::from("ungoogled-12.3.0-win64")));
    }

    #[test]
    fn test_wrong_version_is_none() {
        assert_eq!(find_payload_root(LISTING, "12.3.1", "manifest"), None);
    }

    #[test]
    fn test_top_level_manifest_is_ignored() {
        let listing = "2024-03-01 10:00:00 ....A 412 412  12.3.0.manifest\n";
        assert_eq!(find_payload_root(listing, "12.3.0", "manifest"), None);
    }

    #[test]
    fn test_top_level_manifest_skipped_for_later_nested_match() {
        let listing = "\
2024-03-01 10:00:00 ....A 412 412  12.3.0.manifest
2024-03-01 10:00:00 ....A 412      payload/12.3.0.manifest
";
        assert_eq!(find_payload_root(listing, "12.3.0", "manifest"), Some(PathBuf::from("payload")));
    }

    #[test]
    fn test_nested_parent_path_is_returned_whole() {
        let listing = "x  outer/inner/12.3.0.manifest";
        assert_eq!(
            find_payload_root(listing, "12.3.0", "manifest"),
            Some(PathBuf::from("outer").join("inner"))
        );
    }

    #[test]
    fn test_tolerates_short_lines_and_column_changes() {
        let listing = "\n   \nungoogled-12.3.0-win64/12.3.0.manifest\n";
        assert_eq!(
            find_payload_root(listing, "12.3.0", "manifest"),
            Some(PathBuf::from("ungoogled-12.3.0-win64"))
        );
    }

    #[test]
    fn test_other_manifests_do_not_match() {
        let listing = "a  ungoogled-12.3.0-win64/chrome.VisualElementsManifest.manifest\n";
        assert_eq!(find_payload_root(listing, "12.3.0", "manifest"), None);
    }

    #[test]
    fn test_parent_traversal_is_rejected() {
        let listing = "\
2024-03-01 10:00:00 ....A 412 412  ../12.3.0.manifest
2024-03-01 10:00:00 ....A 412 412  a/../../elsewhere/12.3.0.manifest
2024-03-01 10:00:00 ....A 412 412  ./12.3.0.manifest
";
        assert_eq!(find_payload_root(listing, "12.3.0", "manifest"), None);
    }

    #[test]
    fn test_absolute_and_drive_entries_are_rejected() {
        let listing = "\
x  /opt/chromium/12.3.0.manifest
x  \\\\server\\share\\12.3.0.manifest
x  C:\\Chromium\\12.3.0.manifest
x  C:Chromium\\12.3.0.manifest
";
        assert_eq!(find_payload_root(listing, "12.3.0", "manifest"), None);
    }

    #[test]
    fn test_unsafe_entry_skipped_for_later_safe_match() {
        let listing = "\
x  ../12.3.0.manifest
x  ungoogled-12.3.0-win64/12.3.0.manifest
";
        assert_eq!(
            find_payload_root(listing, "12.3.0", "manifest"),
            Some(PathBuf::from("ungoogled-12.3.0-win64"))
        );
    }

    struct ListingTool(String);

    #[async_trait]
    impl ArchiveTool for ListingTool {
        async fn list(&self, _archive: &Path) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn extract(&self, _archive: &Path, _out_dir: &Path) -> Result<()> {
            unreachable!("inspection never extracts")
        }
    }

    #[tokio::test]
    async fn test_inspector_uses_tool_listing() {
        let inspector = ArchiveInspector::new(Arc::new(ListingTool(LISTING.to_string())), "manifest");
        let root =
            inspector.locate_payload_root(Path::new("zipped_tmp.7z"), "12.3.0").await.unwrap();
        assert_eq!(root, Some(PathBuf::from("ungoogled-12.3.0-win64")));
    }
}
