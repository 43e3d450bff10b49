use super::{ReleaseCandidate, ReleaseIndex};
use crate::config::UpdaterConfig;
use crate::core::UpdaterError;
use crate::utils::progress::DownloadProgress;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Release index backed by the GitHub REST API.
///
/// Lists `GET {api_base_url}/repos/{owner}/{repo}/releases` and downloads
/// assets from their `browser_download_url`. Transport failures and non-2xx
/// responses surface as [`UpdaterError::NetworkError`]. No timeout is set
/// beyond the client defaults.
pub struct GithubReleaseIndex {
    client: reqwest::Client,
    releases_url: String,
}

impl GithubReleaseIndex {
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &config.github_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("github_token contains invalid header characters")?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        let releases_url = format!(
            "{}/repos/{}/{}/releases",
            config.api_base_url.trim_end_matches('/'),
            config.owner,
            config.repo
        );

        Ok(Self {
            client,
            releases_url,
        })
    }

    #[must_use]
    pub fn releases_url(&self) -> &str {
        &self.releases_url
    }
}

#[async_trait]
impl ReleaseIndex for GithubReleaseIndex {
    async fn fetch_releases(&self) -> Result<Vec<ReleaseCandidate>> {
        debug!("Fetching releases from {}", self.releases_url);
        let operation = format!("fetch releases from {}", self.releases_url);

        let response = self
            .client
            .get(&self.releases_url)
            .query(&[("per_page", "100")])
            .send()
            .await
            .map_err(|e| UpdaterError::network(&operation, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::network(&operation, format!("HTTP {status}")).into());
        }

        let releases = response
            .json::<Vec<ReleaseCandidate>>()
            .await
            .map_err(|e| UpdaterError::network(&operation, format!("invalid response body: {e}")))?;
        Ok(releases)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!("Downloading {}", url);
        let operation = format!("download {url}");

        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|e| UpdaterError::network(&operation, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::network(&operation, format!("HTTP {status}")).into());
        }

        let progress = DownloadProgress::new(response.content_length(), "Downloading");
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written = 0u64;
        while let Some(chunk) =
            response.chunk().await.map_err(|e| UpdaterError::network(&operation, e))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        file.sync_all().await.with_context(|| format!("Failed to sync {}", dest.display()))?;
        progress.finish_and_clear();

        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}
