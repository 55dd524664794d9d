//! binup: self-update for Rust binaries
//!
//! A library that lets a running executable discover, validate and
//! atomically replace itself with a newer release published on a
//! code-hosting platform. Detection matches the conventional
//! `<cmd>_<os>_<arch><ext>` asset naming (with `-` tolerated as a
//! separator and `.exe` tolerated on Windows), picks the greatest
//! semantic version, and the downloaded asset can be verified through a
//! composable chain of checksum and signature validators before the
//! running binary is swapped out with rollback on failure.
//!
//! # Update Pipeline
//!
//! ```text
//! 1. Detection
//!    ├── generate architecture candidates (armv7 before arm, ...)
//!    ├── scan releases per candidate, match assets by name suffix or URL
//!    └── record the validation chain (checksums file, its signature, ...)
//!
//! 2. Download & Validation
//!    ├── download the selected asset
//!    └── verify each validation hop (digest, checksum list, ECDSA, PGP)
//!
//! 3. Extraction
//!    └── locate the executable inside zip / tar.gz / tgz / gzip / gz /
//!        tar.xz / xz / bz2, or take the stream as-is
//!
//! 4. Atomic Apply
//!    ├── stage the new binary next to the target
//!    ├── rename-swap with rollback on failure
//!    └── delete (or park, or hide) the old binary
//! ```
//!
//! # Core Modules
//!
//! - [`arch`] - architecture candidate and asset-suffix generation
//! - [`validate`] - composable checksum/signature validators
//! - [`decompress`] - archive dispatch and executable discovery
//! - [`apply`] - atomic binary replacement with rollback
//! - [`source`] - the release-source boundary and the GitHub client
//! - [`error`] - the [`BinupError`] enum; "not found" is `Ok(None)`, never
//!   an error
//!
//! # Example
//!
//! ```no_run
//! use binup::{Config, Repository, UpdateOutcome, Updater};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> binup::Result<()> {
//! let updater = Updater::new(Config::default())?;
//! let cancel = CancellationToken::new();
//! let repository = Repository::parse_slug("owner/name");
//!
//! match updater.update_self(&cancel, env!("CARGO_PKG_VERSION"), &repository).await? {
//!     UpdateOutcome::Updated { release } => {
//!         println!("updated to {}", release.version());
//!     }
//!     UpdateOutcome::UpToDate { version } => {
//!         println!("already up-to-date at {version}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Detection alone (no binary replacement) is [`Updater::detect_latest`];
//! pinning a version works through [`Updater::detect_version`] and
//! bypasses the draft/pre-release admission flags.

// Core pipeline stages
pub mod apply;
pub mod arch;
pub mod decompress;
pub mod validate;

// Data model
pub mod config;
pub mod error;
pub mod release;
pub mod repository;

// Release sources
pub mod source;

// Orchestration
pub mod updater;

pub use config::Config;
pub use error::{BinupError, Result};
pub use release::{Release, ValidationHop};
pub use repository::Repository;
pub use source::github::{GitHubConfig, GitHubSource};
pub use source::{Source, SourceAsset, SourceRelease};
pub use updater::{UpdateOutcome, Updater};
pub use validate::Validator;
