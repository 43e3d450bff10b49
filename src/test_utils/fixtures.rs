//! Builders for release index records and archive listings.

use crate::release::{AssetRef, ReleaseCandidate};
use serde_json::{Value, json};

/// A release candidate with one asset per `(asset_id, asset_name)`.
pub fn candidate(id: u64, name: &str, tag: &str, assets: &[(u64, &str)]) -> ReleaseCandidate {
    ReleaseCandidate {
        id,
        name: Some(name.to_string()),
        tag_name: tag.to_string(),
        assets: assets
            .iter()
            .map(|(asset_id, asset_name)| AssetRef {
                id: *asset_id,
                name: (*asset_name).to_string(),
                download_url: format!("https://downloads.invalid/{asset_name}"),
            })
            .collect(),
    }
}

/// The JSON the release index API returns for one release whose assets are
/// downloaded from `download_base`.
pub fn release_json(id: u64, name: &str, tag: &str, assets: &[(u64, &str)], download_base: &str) -> Value {
    let assets: Vec<Value> = assets
        .iter()
        .map(|(asset_id, asset_name)| {
            json!({
                "id": asset_id,
                "name": asset_name,
                "size": 1024,
                "content_type": "application/x-7z-compressed",
                "browser_download_url": format!("{}/{}", download_base.trim_end_matches('/'), asset_name),
            })
        })
        .collect();

    json!({
        "id": id,
        "name": name,
        "tag_name": tag,
        "draft": false,
        "prerelease": false,
        "assets": assets,
    })
}

/// A `7z l` style listing containing `entries` as file rows.
pub fn listing_for(entries: &[String]) -> String {
    let mut listing = String::from(
        "7-Zip 23.01 (x64) : Copyright (c) 1999-2023 Igor Pavlov : 2023-06-20\n\n\
         Listing archive: zipped_tmp.7z\n\n--\nPath = zipped_tmp.7z\nType = 7z\n\n\
         \x20  Date      Time    Attr         Size   Compressed  Name\n\
         ------------------- ----- ------------ ------------  ------------------------\n",
    );
    for entry in entries {
        listing.push_str(&format!("2024-03-01 10:00:00 ....A          412          300  {entry}\n"));
    }
    listing.push_str("------------------- ----- ------------ ------------  ------------------------\n");
    listing
}
