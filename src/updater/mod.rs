//! The update pipeline.
//!
//! [`Updater`] ties the stages together: release detection
//! ([`detect_latest`]/[`detect_version`]), download, validation,
//! decompression and the atomic apply ([`update_to`], [`update_command`],
//! [`update_self`]). Construction compiles and checks everything the
//! configuration provides, so a misconfigured updater fails before its
//! first network call.
//!
//! The pipeline is sequential; the only suspension points are source
//! I/O, each racing against the caller's cancellation token. Nothing here
//! serializes concurrent invocations: two updates of the same target at
//! the same time are a caller bug (the apply stage performs
//! non-transactional multi-rename filesystem mutation).
//!
//! [`detect_latest`]: Updater::detect_latest
//! [`detect_version`]: Updater::detect_version
//! [`update_to`]: Updater::update_to
//! [`update_command`]: Updater::update_command
//! [`update_self`]: Updater::update_self

use std::path::PathBuf;

use regex::Regex;

use crate::config::Config;
use crate::error::{BinupError, Result};
use crate::source::github::{GitHubConfig, GitHubSource};
use crate::source::Source;
use crate::validate::Validator;

mod detect;
mod update;

pub use update::UpdateOutcome;

/// Coordinates release detection, validation, decompression and the
/// atomic binary replacement against a release [`Source`].
pub struct Updater {
    source: Box<dyn Source>,
    validator: Option<Box<dyn Validator>>,
    filters: Vec<Regex>,
    os: String,
    arch: String,
    arm: u8,
    universal_arch: Option<String>,
    prerelease: bool,
    draft: bool,
    old_save_path: Option<PathBuf>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("filters", &self.filters)
            .field("os", &self.os)
            .field("arch", &self.arch)
            .field("arm", &self.arm)
            .field("universal_arch", &self.universal_arch)
            .field("prerelease", &self.prerelease)
            .field("draft", &self.draft)
            .field("old_save_path", &self.old_save_path)
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Builds an updater from the configuration.
    ///
    /// Fails fast: filter patterns are compiled here, the ARM sub-version
    /// is range-checked here, and the default GitHub source is constructed
    /// here. Nothing is left to surprise the first detection call.
    ///
    /// # Errors
    ///
    /// [`BinupError::InvalidFilter`] for an uncompilable filter pattern;
    /// [`BinupError::Config`] for an ARM sub-version outside `{0, 5, 6,
    /// 7}`; [`BinupError::Network`] when the default HTTP client cannot be
    /// built.
    pub fn new(config: Config) -> Result<Self> {
        let source = match config.source {
            Some(source) => source,
            None => Box::new(GitHubSource::new(GitHubConfig::default())?),
        };

        let mut filters = Vec::with_capacity(config.filters.len());
        for filter in config.filters {
            let compiled = Regex::new(&filter)
                .map_err(|source| BinupError::InvalidFilter { pattern: filter, source })?;
            filters.push(compiled);
        }

        if config.arm != 0 && !(5..=7).contains(&config.arm) {
            return Err(BinupError::Config {
                message: format!("invalid ARM sub-version {} (valid values: 0, 5, 6, 7)", config.arm),
            });
        }

        let os = if config.os.is_empty() {
            std::env::consts::OS.to_string()
        } else {
            config.os
        };
        let arch = if config.arch.is_empty() {
            std::env::consts::ARCH.to_string()
        } else {
            config.arch
        };
        // a universal binary token only means something on macOS, whether
        // spelled the Rust way or the Go way
        let universal_arch = if matches!(os.as_str(), "macos" | "darwin") {
            config.universal_arch
        } else {
            None
        };

        Ok(Self {
            source,
            validator: config.validator,
            filters,
            os,
            arch,
            arm: config.arm,
            universal_arch,
            prerelease: config.prerelease,
            draft: config.draft,
            old_save_path: config.old_save_path,
        })
    }
}
