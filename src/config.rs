//! Updater configuration.
//!
//! A [`Config`] is built once by the caller and handed to
//! [`Updater::new`](crate::Updater::new); there is no process-wide default
//! instance. Everything that can be wrong with a configuration (filter
//! patterns, the ARM sub-version) is reported at construction time, before
//! any network call.

use std::path::PathBuf;

use crate::source::Source;
use crate::validate::Validator;

/// Configuration of the update pipeline.
///
/// The zero value (via [`Default`]) targets the current platform, uses
/// GitHub as the source, applies no extra validation, and skips drafts and
/// pre-releases.
///
/// # Examples
///
/// ```no_run
/// use binup::{Config, Updater};
/// use binup::validate::ChecksumValidator;
///
/// # fn example() -> binup::Result<Updater> {
/// Updater::new(Config {
///     validator: Some(Box::new(ChecksumValidator::new("checksums.txt"))),
///     prerelease: true,
///     ..Config::default()
/// })
/// # }
/// ```
#[derive(Default)]
pub struct Config {
    /// Where to load the releases from. `None` uses GitHub with its
    /// default configuration.
    pub source: Option<Box<dyn Source>>,

    /// Additional validation of downloaded releases (checksums,
    /// signatures). `None` skips validation entirely.
    pub validator: Option<Box<dyn Validator>>,

    /// Regular expressions filtering the assets of releases that ship more
    /// than one. An asset is selected if it matches any of them; make sure
    /// the filters uniquely match one asset. When set, the filters replace
    /// the OS/arch suffix matching entirely.
    pub filters: Vec<String>,

    /// Target OS token, e.g. `"linux"`. Empty means
    /// [`std::env::consts::OS`].
    pub os: String,

    /// Target architecture token, e.g. `"amd64"`. Empty means
    /// [`std::env::consts::ARCH`].
    pub arch: String,

    /// ARM 32-bit sub-version. Valid values are 0 (unknown), 5, 6 or 7.
    pub arm: u8,

    /// Architecture token of a universal ("fat") binary asset, tried last
    /// when no architecture-specific asset matches. Only honored on macOS
    /// targets.
    pub universal_arch: Option<String>,

    /// Permit updating to a draft release.
    pub draft: bool,

    /// Permit updating to a pre-release.
    pub prerelease: bool,

    /// Keep the replaced binary at this path after a successful update
    /// instead of deleting it.
    pub old_save_path: Option<PathBuf>,
}
