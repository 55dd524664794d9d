//! The outcome of release detection.

use chrono::{DateTime, Utc};
use semver::Version;

use crate::repository::Repository;

/// One hop of the validation chain recorded during detection.
///
/// The first hop validates the release asset itself; each further hop
/// validates the previous hop's validation asset (e.g. a checksums file
/// that is itself signed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationHop {
    /// ID of the validation asset on the source platform
    pub asset_id: i64,
    /// Filename of the validation asset
    pub asset_name: String,
    /// Download URL of the validation asset
    pub asset_url: String,
}

/// A release asset selected for the configured OS and architecture.
///
/// Produced by [`Updater::detect_latest`] and
/// [`Updater::detect_version`]; consumed by [`Updater::update_to`].
/// Read-only once constructed: all selection decisions (which release,
/// which asset, which validation assets) have already been made.
///
/// [`Updater::detect_latest`]: crate::Updater::detect_latest
/// [`Updater::detect_version`]: crate::Updater::detect_version
/// [`Updater::update_to`]: crate::Updater::update_to
#[derive(Debug, Clone)]
pub struct Release {
    pub(crate) version: Version,
    pub(crate) repository: Repository,

    /// URL of the selected asset
    pub asset_url: String,
    /// Size of the selected asset in bytes
    pub asset_byte_size: u64,
    /// ID of the selected asset on the source platform
    pub asset_id: i64,
    /// Filename of the selected asset
    pub asset_name: String,
    /// ID of the release on the source platform
    pub release_id: i64,
    /// Validation assets consumed to trust the release asset, in order
    pub validation_chain: Vec<ValidationHop>,
    /// URL of the release page, for browsing
    pub url: String,
    /// Free-text release notes
    pub release_notes: String,
    /// Display name of the release
    pub name: String,
    /// When the release was published
    pub published_at: Option<DateTime<Utc>>,
    /// Target OS this release was selected for
    pub os: String,
    /// Target architecture this release was selected for
    pub arch: String,
    /// ARM sub-version the selection ran with (0 when unknown)
    pub arm: u8,
    /// True for alpha, beta or release-candidate releases
    pub prerelease: bool,
}

impl Release {
    /// The parsed semantic version of the release.
    ///
    /// `semver::Version` is `Ord`, so callers compare directly:
    ///
    /// ```
    /// # use semver::Version;
    /// # let detected = Version::new(1, 2, 3);
    /// let current = Version::new(1, 2, 0);
    /// assert!(detected > current);
    /// ```
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// The repository this release was detected in.
    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repository
    }
}

impl std::fmt::Display for Release {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.version, self.asset_name)
    }
}
