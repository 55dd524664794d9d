//! Release and asset selection.
//!
//! Detection walks the architecture candidates from [`crate::arch`] one at
//! a time and, per candidate, scans *all* releases for the best matching
//! (release, asset, version) triple. The first candidate that yields any
//! match wins, deliberately, even if a later candidate would yield a
//! newer version: the more specific tokens (`armv7` before `arm`) are the
//! ones less likely to be false positives.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Updater;
use crate::arch::{additional_arches, candidate_suffixes};
use crate::error::{BinupError, Result};
use crate::release::{Release, ValidationHop};
use crate::repository::Repository;
use crate::source::{SourceAsset, SourceRelease};
use crate::validate::{Validator, MAX_VALIDATION_CHAIN_LENGTH};

/// First `major.minor.patch` run inside a tag name.
static RE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("hard-coded regex"));

impl Updater {
    /// Detects the latest release matching the configured OS, architecture
    /// and filters.
    ///
    /// Drafts and pre-releases are skipped unless the configuration admits
    /// them. Assets are matched by the conventional
    /// `<cmd>_<os>_<arch><ext>` suffix (both `_` and `-` separators, all
    /// supported compression extensions, `.exe` tolerated on Windows) on
    /// the asset name or its download URL.
    ///
    /// Returns `Ok(None)` when nothing matches; not-found is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Source failures, and [`BinupError::ValidationAssetNotFound`] /
    /// [`BinupError::ValidationChainTooLong`] when a configured validator
    /// cannot be satisfied by the release's assets.
    pub async fn detect_latest(
        &self,
        cancel: &CancellationToken,
        repository: &Repository,
    ) -> Result<Option<Release>> {
        self.detect_version(cancel, repository, "").await
    }

    /// Detects the release with the given tag name.
    ///
    /// An explicit version bypasses the draft and pre-release admission
    /// flags: asking for `"v1.1.0-beta"` finds the beta regardless of
    /// configuration. An empty `version` behaves like
    /// [`detect_latest`](Updater::detect_latest).
    ///
    /// # Errors
    ///
    /// Same as [`detect_latest`](Updater::detect_latest).
    pub async fn detect_version(
        &self,
        cancel: &CancellationToken,
        repository: &Repository,
        version: &str,
    ) -> Result<Option<Release>> {
        let releases = self.source.list_releases(cancel, repository).await?;
        let target_version = if version.is_empty() { None } else { Some(version) };

        let Some((source_release, asset, ver)) =
            self.find_release_and_asset(&releases, target_version)
        else {
            return Ok(None);
        };

        info!(
            tag = %source_release.tag_name,
            name = %source_release.name,
            asset = %asset.name,
            "release found",
        );

        let mut release = Release {
            version: ver,
            repository: repository.clone(),
            asset_url: asset.url.clone(),
            asset_byte_size: asset.size,
            asset_id: asset.id,
            asset_name: asset.name.clone(),
            release_id: source_release.id,
            validation_chain: Vec::new(),
            url: source_release.url.clone(),
            release_notes: source_release.release_notes.clone(),
            name: source_release.name.clone(),
            published_at: source_release.published_at,
            os: self.os.clone(),
            arch: self.arch.clone(),
            arm: self.arm,
            prerelease: source_release.prerelease,
        };

        if let Some(validator) = &self.validator {
            build_validation_chain(&mut release, source_release, validator.as_ref())?;
        }

        Ok(Some(release))
    }

    /// Architecture tokens to scan, most specific first, the literal one
    /// second to last, the universal one (if any) last.
    fn arch_candidates(&self) -> Vec<String> {
        let mut candidates = additional_arches(&self.arch, self.arm);
        candidates.push(self.arch.clone());
        if let Some(universal) = &self.universal_arch {
            candidates.push(universal.clone());
        }
        candidates
    }

    fn find_release_and_asset<'a>(
        &self,
        releases: &'a [SourceRelease],
        target_version: Option<&str>,
    ) -> Option<(&'a SourceRelease, &'a SourceAsset, Version)> {
        for arch in self.arch_candidates() {
            if let Some(found) = self.find_for_arch(&arch, releases, target_version) {
                return Some(found);
            }
        }
        None
    }

    /// Full scan of all releases for one architecture candidate, keeping
    /// the greatest semantic version (first found wins an exact tie).
    fn find_for_arch<'a>(
        &self,
        arch: &str,
        releases: &'a [SourceRelease],
        target_version: Option<&str>,
    ) -> Option<(&'a SourceRelease, &'a SourceAsset, Version)> {
        debug!(os = %self.os, %arch, "searching for a release candidate");
        let suffixes = candidate_suffixes(&self.os, arch);

        let mut best: Option<(&SourceRelease, &SourceAsset, Version)> = None;
        for release in releases {
            if let Some((asset, version)) =
                self.find_asset_in_release(release, &suffixes, target_version)
            {
                // a version with a pre-release tag sorts below the plain
                // version, per semver precedence
                if best.as_ref().is_none_or(|(_, _, best_version)| version > *best_version) {
                    best = Some((release, asset, version));
                }
            }
        }

        if best.is_none() {
            debug!(os = %self.os, %arch, "no matching release/asset");
        }
        best
    }

    fn find_asset_in_release<'a>(
        &self,
        release: &'a SourceRelease,
        suffixes: &[String],
        target_version: Option<&str>,
    ) -> Option<(&'a SourceAsset, Version)> {
        if let Some(target) = target_version {
            if target != release.tag_name {
                debug!(tag = %release.tag_name, %target, "skipping, not the requested version");
                return None;
            }
        }
        if release.draft && !self.draft && target_version.is_none() {
            debug!(tag = %release.tag_name, "skipping draft release");
            return None;
        }
        if release.prerelease && !self.prerelease && target_version.is_none() {
            debug!(tag = %release.tag_name, "skipping pre-release");
            return None;
        }

        let version = parse_tag_version(&release.tag_name)?;

        for asset in &release.assets {
            if self.filters.is_empty() {
                // case-insensitive suffix search on the name, and on the
                // URL too: some providers rename the visible asset but
                // keep a meaningful download URL
                let name = asset.name.to_lowercase();
                let url = asset.url.to_lowercase();
                if suffixes
                    .iter()
                    .any(|suffix| name.ends_with(suffix.as_str()) || url.ends_with(suffix.as_str()))
                {
                    return Some((asset, version));
                }
            } else if self
                .filters
                .iter()
                .any(|filter| filter.is_match(&asset.name) || filter.is_match(&asset.url))
            {
                // configured filters replace the suffix rule entirely
                debug!(asset = %asset.name, "selected filtered asset");
                return Some((asset, version));
            }
        }

        debug!(tag = %release.tag_name, "no suitable asset in release");
        None
    }
}

/// Extracts the semantic version from a tag name.
///
/// The version text is the first `\d+.\d+.\d+` run and everything after it
/// (`release-v1.2.3-beta` parses as `1.2.3-beta`); tags without a parsable
/// version disqualify their whole release.
fn parse_tag_version(tag: &str) -> Option<Version> {
    let found = RE_VERSION.find(tag)?;
    let text = &tag[found.start()..];
    match Version::parse(text) {
        Ok(version) => Some(version),
        Err(_) => {
            debug!(%tag, "tag does not adopt semantic versioning, skipping");
            None
        }
    }
}

/// Records every validation hop the configured validator will need.
///
/// Starting from the release asset, each hop's companion asset must exist
/// in the release; recursive validators keep the chain going until the
/// expected name stops changing or the validator is done.
fn build_validation_chain(
    release: &mut Release,
    source_release: &SourceRelease,
    validator: &dyn Validator,
) -> Result<()> {
    let mut current = release.asset_name.clone();
    loop {
        if release.validation_chain.len() >= MAX_VALIDATION_CHAIN_LENGTH {
            return Err(BinupError::ValidationChainTooLong { max: MAX_VALIDATION_CHAIN_LENGTH });
        }

        let validation_name = validator.validation_asset_name(&current);
        let Some(validation_asset) = find_asset_by_name(source_release, &validation_name) else {
            return Err(BinupError::ValidationAssetNotFound { name: validation_name });
        };
        debug!(asset = %current, proof = %validation_name, "validation hop recorded");
        release.validation_chain.push(ValidationHop {
            asset_id: validation_asset.id,
            asset_name: validation_asset.name.clone(),
            asset_url: validation_asset.url.clone(),
        });

        if !validator.must_continue_validation(&validation_name) {
            break;
        }
        if validator.validation_asset_name(&validation_name) == validation_name {
            break;
        }
        current = validation_name;
    }
    Ok(())
}

fn find_asset_by_name<'a>(release: &'a SourceRelease, name: &str) -> Option<&'a SourceAsset> {
    release.assets.iter().find(|asset| asset.name == name)
}
