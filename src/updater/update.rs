//! The update orchestrator: download, validate, decompress, apply.

use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Updater;
use crate::apply::{self, ApplyOptions};
use crate::decompress::decompress_command;
use crate::error::{BinupError, Result};
use crate::release::Release;
use crate::repository::Repository;

/// Outcome of [`Updater::update_command`] / [`Updater::update_self`].
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Nothing newer was found, or the detected release already matches
    /// the current version; the binary was not touched.
    UpToDate {
        /// The version the binary is (still) at
        version: Version,
    },
    /// The binary was replaced.
    Updated {
        /// The release it was replaced with
        release: Release,
    },
}

impl Updater {
    /// Downloads the release asset, runs the validation chain when a
    /// validator is configured, extracts the executable and atomically
    /// replaces `cmd_path` with it.
    ///
    /// # Errors
    ///
    /// Download, validation, decompression or filesystem errors from the
    /// respective stage, including the distinguished
    /// [`BinupError::RollbackFailed`]; [`BinupError::Cancelled`] when the
    /// token fires during a suspension point.
    pub async fn update_to(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        cmd_path: &Path,
    ) -> Result<()> {
        let data = self.download(cancel, release, release.asset_id, &release.asset_name).await?;

        if self.validator.is_some() {
            self.run_validation_chain(cancel, release, &data).await?;
        }

        self.decompress_and_apply(data, release, cmd_path)
    }

    /// Updates the binary at `cmd_path` to the latest detected release.
    ///
    /// `current` is the version the binary believes it is at. Symlinks are
    /// resolved first so the real file gets replaced, and on Windows
    /// targets a missing `.exe` extension is appended. When detection
    /// finds nothing, or finds exactly `current`, the binary is left alone
    /// and [`UpdateOutcome::UpToDate`] is returned.
    ///
    /// # Errors
    ///
    /// [`BinupError::InvalidVersion`] when `current` does not parse (fails
    /// before any network call); otherwise the detection and update errors
    /// of [`Updater::detect_latest`] and [`Updater::update_to`].
    pub async fn update_command(
        &self,
        cancel: &CancellationToken,
        cmd_path: &Path,
        current: &str,
        repository: &Repository,
    ) -> Result<UpdateOutcome> {
        let current_version = Version::parse(current).map_err(|source| {
            BinupError::InvalidVersion { version: current.to_string(), source }
        })?;

        let mut cmd_path = cmd_path.to_path_buf();
        if self.os == "windows" && !cmd_path.to_string_lossy().ends_with(".exe") {
            let mut with_exe = cmd_path.into_os_string();
            with_exe.push(".exe");
            cmd_path = PathBuf::from(with_exe);
        }

        // follow a symlink to the real binary; replacing the link itself
        // would leave the original file behind as the target of nothing
        let metadata = fs::symlink_metadata(&cmd_path)?;
        if metadata.file_type().is_symlink() {
            cmd_path = fs::canonicalize(&cmd_path)?;
            debug!(target = %cmd_path.display(), "resolved symlink");
        }

        let Some(release) = self.detect_latest(cancel, repository).await? else {
            info!("no release detected, current version is considered up-to-date");
            return Ok(UpdateOutcome::UpToDate { version: current_version });
        };
        if release.version == current_version {
            info!(version = %current_version, "current version is the latest, update is not needed");
            return Ok(UpdateOutcome::UpToDate { version: current_version });
        }

        info!(
            from = %current_version,
            to = %release.version,
            target = %cmd_path.display(),
            "updating",
        );
        self.update_to(cancel, &release, &cmd_path).await?;
        Ok(UpdateOutcome::Updated { release })
    }

    /// Updates the running executable itself to the latest release.
    ///
    /// # Errors
    ///
    /// Same as [`Updater::update_command`], plus the I/O errors of
    /// resolving the running executable's path.
    pub async fn update_self(
        &self,
        cancel: &CancellationToken,
        current: &str,
        repository: &Repository,
    ) -> Result<UpdateOutcome> {
        let cmd_path = apply::executable_path()?;
        self.update_command(cancel, &cmd_path, current, repository).await
    }

    /// Walks the recorded validation chain: each hop's proof is fetched
    /// and checked against the previous payload, then becomes the payload
    /// of the next hop.
    async fn run_validation_chain(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        data: &[u8],
    ) -> Result<()> {
        let Some(validator) = &self.validator else {
            return Ok(());
        };

        let mut name = release.asset_name.clone();
        let mut payload = data.to_vec();
        for hop in &release.validation_chain {
            let proof = self.download(cancel, release, hop.asset_id, &hop.asset_name).await?;
            validator.validate(&name, &payload, &proof).map_err(|err| BinupError::Validation {
                name: name.clone(),
                source: Box::new(err),
            })?;
            debug!(asset = %name, proof = %hop.asset_name, "validation hop passed");
            name = hop.asset_name.clone();
            payload = proof;
        }
        Ok(())
    }

    fn decompress_and_apply(
        &self,
        data: Vec<u8>,
        release: &Release,
        cmd_path: &Path,
    ) -> Result<()> {
        let cmd = cmd_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| BinupError::Config {
                message: format!("invalid target path {}", cmd_path.display()),
            })?;

        let executable =
            decompress_command(data, &release.asset_name, &cmd, &self.os, &self.arch)?;

        info!(target = %cmd_path.display(), from = %release.asset_url, "applying update");
        apply::apply(
            executable.as_slice(),
            &ApplyOptions {
                target_path: Some(cmd_path.to_path_buf()),
                old_save_path: self.old_save_path.clone(),
                ..ApplyOptions::default()
            },
        )
    }

    async fn download(
        &self,
        cancel: &CancellationToken,
        release: &Release,
        asset_id: i64,
        name: &str,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(BinupError::Cancelled);
        }
        self.source.download_release_asset(cancel, release, asset_id).await.map_err(
            |err| match err {
                BinupError::Cancelled => BinupError::Cancelled,
                other => BinupError::Download { name: name.to_string(), source: Box::new(other) },
            },
        )
    }
}
