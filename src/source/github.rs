//! GitHub release source.
//!
//! Speaks the GitHub Releases REST API: one call to list releases, one
//! call per asset download. Authentication is optional (public
//! repositories work anonymously) and comes from the configured token or
//! the `GITHUB_TOKEN` environment variable. GitHub Enterprise works by
//! pointing [`GitHubConfig::enterprise_base_url`] at the instance's
//! `/api/v3` endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{cancellable, Source, SourceAsset, SourceRelease};
use crate::error::{BinupError, Result};
use crate::release::Release;
use crate::repository::Repository;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// Configuration for [`GitHubSource`].
#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    /// GitHub API token. Falls back to the `GITHUB_TOKEN` environment
    /// variable; anonymous access is used when neither is set.
    pub api_token: Option<String>,

    /// Base URL of a GitHub Enterprise API, e.g.
    /// `https://github.example.com/api/v3`. `None` targets github.com.
    pub enterprise_base_url: Option<String>,
}

/// Loads release information from GitHub.
pub struct GitHubSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubSource {
    /// Creates a new GitHub source.
    ///
    /// # Errors
    ///
    /// [`BinupError::Network`] when the underlying HTTP client cannot be
    /// built (TLS backend initialization, essentially).
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let token = config
            .api_token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.is_empty());
        let base_url = config
            .enterprise_base_url
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            // the GitHub API rejects requests without a user agent
            .user_agent(concat!("binup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| BinupError::Network {
                operation: "building HTTP client".to_string(),
                source,
            })?;
        Ok(Self { client, base_url, token })
    }

    fn get(&self, url: &str, accept: &'static str) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }
}

#[async_trait]
impl Source for GitHubSource {
    async fn list_releases(
        &self,
        cancel: &CancellationToken,
        repository: &Repository,
    ) -> Result<Vec<SourceRelease>> {
        let (owner, name) = repository.slug()?;
        let url = format!("{}/repos/{owner}/{name}/releases?per_page=100", self.base_url);
        debug!(%url, "listing releases");

        let request = self.get(&url, "application/vnd.github+json").send();
        let response = cancellable(cancel, "listing releases", request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            // repository not found or no releases: nothing to offer, but
            // not an error at this boundary
            debug!(repository = %repository, "API returned 404, repository or releases not found");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(BinupError::SourceResponse {
                operation: "listing releases".to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let releases: Vec<GitHubRelease> =
            cancellable(cancel, "reading release list", response.json()).await?;
        Ok(releases.into_iter().map(GitHubRelease::into_source_release).collect())
    }

    async fn download_release_asset(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        asset_id: i64,
    ) -> Result<Vec<u8>> {
        let (owner, name) = release.repository().slug()?;
        let url = format!("{}/repos/{owner}/{name}/releases/assets/{asset_id}", self.base_url);
        debug!(%url, "downloading release asset");

        // asking for octet-stream makes the API redirect to the raw file
        let request = self.get(&url, "application/octet-stream").send();
        let response = cancellable(cancel, "downloading asset", request).await?;

        if !response.status().is_success() {
            return Err(BinupError::SourceResponse {
                operation: format!("downloading asset {asset_id}"),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = cancellable(cancel, "downloading asset", response.bytes()).await?;
        Ok(bytes.to_vec())
    }
}

/// Release shape of the GitHub Releases API; only the fields we read.
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    id: i64,
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    id: i64,
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    browser_download_url: String,
}

impl GitHubRelease {
    fn into_source_release(self) -> SourceRelease {
        SourceRelease {
            id: self.id,
            name: self.name.unwrap_or_default(),
            tag_name: self.tag_name,
            url: self.html_url,
            draft: self.draft,
            prerelease: self.prerelease,
            published_at: self.published_at,
            release_notes: self.body.unwrap_or_default(),
            assets: self
                .assets
                .into_iter()
                .map(|asset| SourceAsset {
                    id: asset.id,
                    name: asset.name,
                    size: asset.size,
                    url: asset.browser_download_url,
                })
                .collect(),
        }
    }
}
