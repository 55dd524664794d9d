//! Error handling for binup
//!
//! This module provides the strongly-typed error enum used across the crate.
//! The design follows two principles:
//! 1. **One variant per failure mode** so callers can match on exactly the
//!    case they care about (a digest mismatch is not a missing companion
//!    file, a rollback failure is not a generic I/O error)
//! 2. **Enough context to log usefully**: variants carry the asset name,
//!    filename, or pattern involved so callers never have to re-derive it
//!
//! # Error Categories
//!
//! - **Configuration**: [`BinupError::Config`], [`BinupError::InvalidFilter`],
//!   [`BinupError::InvalidRepository`], [`BinupError::InvalidVersion`],
//!   all reported at construction time, before any network call
//! - **Validation**: [`BinupError::ValidationAssetNotFound`],
//!   [`BinupError::ChecksumMismatch`], [`BinupError::HashNotFound`],
//!   [`BinupError::SignatureVerificationFailed`],
//!   [`BinupError::ValidationChainTooLong`], and friends
//! - **Decompression**: [`BinupError::CannotDecompress`],
//!   [`BinupError::ExecutableNotFound`]
//! - **Filesystem**: [`BinupError::Io`] and the distinguished
//!   [`BinupError::RollbackFailed`]
//! - **Network**: [`BinupError::Network`], [`BinupError::Download`],
//!   and [`BinupError::Cancelled`] (always distinct from a network failure)
//!
//! "No matching release" is deliberately **not** an error: detection returns
//! `Ok(None)` instead (see [`crate::Updater::detect_latest`]).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = BinupError> = std::result::Result<T, E>;

/// The error type for all binup operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BinupError {
    /// Invalid configuration detected while building the updater.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// An asset name filter could not be compiled as a regular expression.
    #[error("could not compile regular expression {pattern:?} for filtering releases")]
    InvalidFilter {
        /// The filter pattern as given in the configuration
        pattern: String,
        /// The underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// The repository reference does not resolve to a non-empty owner and name.
    #[error("invalid repository reference: {reason}")]
    InvalidRepository {
        /// Why the reference was rejected
        reason: String,
    },

    /// A version string did not parse as a semantic version.
    #[error("invalid semantic version {version:?}")]
    InvalidVersion {
        /// The offending version text
        version: String,
        /// The underlying semver parse error
        #[source]
        source: semver::Error,
    },

    /// The validator asked for a companion asset that the release does not carry.
    #[error("validation asset not found: {name:?}")]
    ValidationAssetNotFound {
        /// Name of the missing validation asset
        name: String,
    },

    /// The computed digest does not match the digest recorded in the proof.
    #[error("checksum validation failed: expected {expected:?}, found {found:?}")]
    ChecksumMismatch {
        /// Hex digest recorded in the validation asset
        expected: String,
        /// Hex digest computed from the downloaded bytes
        found: String,
    },

    /// The checksum file is not in the `<hex><two spaces><filename>` format.
    #[error("incorrect checksum file format")]
    IncorrectChecksumFile,

    /// The checksum file does not contain an entry for the target file.
    #[error("hash for {filename:?} not found in checksum file")]
    HashNotFound {
        /// The filename that was looked up
        filename: String,
    },

    /// A signature validator was used without a configured public key.
    #[error("no public key configured for signature verification")]
    NoPublicKey,

    /// A detached-signature validator was used without a configured keyring.
    #[error("no keyring configured for signature verification")]
    NoKeyRing,

    /// The signature bytes could not be decoded at all.
    #[error("invalid or malformed signature")]
    InvalidSignature,

    /// The signature decoded but does not verify against the configured key.
    #[error("{scheme} signature verification failed")]
    SignatureVerificationFailed {
        /// Signature scheme, `"ECDSA"` or `"PGP"`
        scheme: &'static str,
    },

    /// No pattern of a pattern router matched the filename.
    #[error("no validator found for {filename:?}")]
    ValidatorNotFound {
        /// Filename that matched none of the configured glob patterns
        filename: String,
    },

    /// Recursive validation exceeded the nesting-depth guard.
    ///
    /// A pattern router can (mis)configure a validation loop, e.g. by
    /// pointing a validator at its own output. The chain builder refuses
    /// to record more than `max` hops instead of looping forever.
    #[error("recursive validation nesting depth exceeded ({max} hops)")]
    ValidationChainTooLong {
        /// The maximum number of hops allowed
        max: usize,
    },

    /// The archive codec failed; the downloaded asset is likely corrupt.
    #[error("failed to decompress {format} file: {reason}")]
    CannotDecompress {
        /// Archive format that was being decoded (e.g. `"zip"`, `"tar.gz"`)
        format: &'static str,
        /// Codec-level failure description
        reason: String,
    },

    /// The archive decoded fine but no entry matched the executable name.
    #[error("executable {cmd:?} not found in archive")]
    ExecutableNotFound {
        /// The command name that was searched for
        cmd: String,
    },

    /// An HTTP operation against the source provider failed.
    #[error("network error during {operation}")]
    Network {
        /// What was being attempted (e.g. `"listing releases"`)
        operation: String,
        /// The underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The source provider answered, but not with what we asked for.
    #[error("unexpected response from source during {operation}: {reason}")]
    SourceResponse {
        /// What was being attempted
        operation: String,
        /// Status line or decode failure description
        reason: String,
    },

    /// Downloading a release or validation asset failed.
    #[error("failed to read asset {name:?}")]
    Download {
        /// Name of the asset being downloaded
        name: String,
        /// The underlying error
        #[source]
        source: Box<BinupError>,
    },

    /// Validating downloaded content against a validation asset failed.
    #[error("failed validating asset content {name:?}")]
    Validation {
        /// Name of the payload being validated
        name: String,
        /// The underlying validation error
        #[source]
        source: Box<BinupError>,
    },

    /// The operation was cancelled through the caller's [`CancellationToken`].
    ///
    /// [`CancellationToken`]: tokio_util::sync::CancellationToken
    #[error("operation cancelled")]
    Cancelled,

    /// The new binary could not be moved into place **and** the old binary
    /// could not be restored.
    ///
    /// The filesystem is left without a valid executable at the target path
    /// and needs manual recovery. Callers must check for this case (see
    /// [`BinupError::rollback_error`]) and must never treat it as a plain
    /// I/O error.
    #[error("failed to rollback from broken update: {update}; rollback error: {rollback}")]
    RollbackFailed {
        /// The rename error that broke the update
        update: std::io::Error,
        /// The error hit while trying to restore the old binary
        rollback: std::io::Error,
    },

    /// Plain I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BinupError {
    /// Returns the rollback error if this is the distinguished
    /// [`RollbackFailed`](BinupError::RollbackFailed) case, `None` otherwise.
    ///
    /// Mirrors the "was the filesystem left inconsistent?" question: a
    /// `Some` answer means the target path no longer holds a valid
    /// executable and the user has to recover manually.
    #[must_use]
    pub fn rollback_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// True when the error was caused by cancellation rather than failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
