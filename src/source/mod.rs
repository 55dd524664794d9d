//! Release sources.
//!
//! A [`Source`] is the thin boundary between the update pipeline and a
//! hosting provider's REST API: it lists the releases of a repository and
//! downloads individual assets, nothing more. The pipeline never inspects
//! provider wire formats; providers map their own release shape onto
//! [`SourceRelease`]/[`SourceAsset`] and keep everything else to
//! themselves.
//!
//! [`github::GitHubSource`] is the bundled implementation (and the default
//! when no source is configured). Custom providers only have to implement
//! the two trait methods; "repository or release not found" is reported as
//! an empty list, not an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{BinupError, Result};
use crate::release::Release;
use crate::repository::Repository;

pub mod github;

/// One release as reported by the hosting provider.
///
/// Constructed by a [`Source`] per call and read-only afterward.
#[derive(Debug, Clone)]
pub struct SourceRelease {
    /// Provider-assigned release ID
    pub id: i64,
    /// Display name of the release
    pub name: String,
    /// Tag the release was cut from (the version is parsed out of this)
    pub tag_name: String,
    /// URL of the release page, for browsing
    pub url: String,
    /// True for unpublished drafts
    pub draft: bool,
    /// True for alpha, beta or release-candidate releases
    pub prerelease: bool,
    /// When the release was published
    pub published_at: Option<DateTime<Utc>>,
    /// Free-text release notes
    pub release_notes: String,
    /// Downloadable files attached to the release
    pub assets: Vec<SourceAsset>,
}

/// One downloadable file attached to a [`SourceRelease`].
#[derive(Debug, Clone)]
pub struct SourceAsset {
    /// Provider-assigned asset ID
    pub id: i64,
    /// Asset filename
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Direct download URL
    pub url: String,
}

/// A provider of releases (GitHub, or anything implementing the contract).
///
/// Both operations accept a [`CancellationToken`]; an aborted operation
/// surfaces [`BinupError::Cancelled`], which stays distinguishable from
/// network failures.
#[async_trait]
pub trait Source: Send + Sync {
    /// Lists the releases of the repository, newest first when the
    /// provider orders them at all.
    ///
    /// An unknown repository (or one without releases) yields an empty
    /// list; not-found is not an error at this boundary.
    ///
    /// # Errors
    ///
    /// [`BinupError::InvalidRepository`] before any network I/O for
    /// references the provider cannot resolve; [`BinupError::Network`] /
    /// [`BinupError::SourceResponse`] for transport and protocol
    /// failures; [`BinupError::Cancelled`] on cancellation.
    async fn list_releases(
        &self,
        cancel: &CancellationToken,
        repository: &Repository,
    ) -> Result<Vec<SourceRelease>>;

    /// Downloads one asset of a previously detected release.
    ///
    /// # Errors
    ///
    /// Same categories as [`list_releases`](Source::list_releases).
    async fn download_release_asset(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        asset_id: i64,
    ) -> Result<Vec<u8>>;
}

/// Races a provider request against cancellation.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    operation: &str,
    request: F,
) -> Result<T>
where
    F: Future<Output = reqwest::Result<T>>,
{
    tokio::select! {
        // cancellation wins over an already-completed request so the error
        // kind stays deterministic
        biased;
        () = cancel.cancelled() => Err(BinupError::Cancelled),
        result = request => result.map_err(|source| BinupError::Network {
            operation: operation.to_string(),
            source,
        }),
    }
}
