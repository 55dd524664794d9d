//! Release validation.
//!
//! A downloaded asset is only trusted after its bytes are checked against a
//! *validation asset* published alongside it: a `.sha256` digest file, a
//! `SHA256SUMS`-style checksum list, or a detached ECDSA/PGP signature.
//! Validators are composable: a [`PatternValidator`] routes filenames to
//! sub-validators by glob pattern, and because a checksum list can itself
//! be signed, validation may chain across several hops (asset → checksums
//! file → signature of the checksums file).
//!
//! The chain is *recorded* during detection (so a missing companion file is
//! reported before anything is downloaded) and *executed* right before the
//! binary is replaced. A misconfigured router can loop; the chain builder
//! caps the nesting depth at [`MAX_VALIDATION_CHAIN_LENGTH`] hops.
//!
//! # Example: checksums file signed with PGP
//!
//! ```no_run
//! use binup::validate::checksum_with_pgp_validator;
//!
//! # fn example(keyring: &[u8]) -> binup::Result<()> {
//! // "SHA256SUMS" is verified by "SHA256SUMS.asc"; every other asset is
//! // verified by its entry in "SHA256SUMS"; the signature file itself
//! // needs no validation.
//! let validator = checksum_with_pgp_validator("SHA256SUMS", keyring)?;
//! # let _ = validator; Ok(())
//! # }
//! ```

use std::io::Cursor;

use glob::Pattern;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{BinupError, Result};

/// Maximum number of validation hops recorded for one release.
///
/// Bounds pathological or misconfigured pattern routers; see
/// [`BinupError::ValidationChainTooLong`].
pub const MAX_VALIDATION_CHAIN_LENGTH: usize = 20;

/// Width of a SHA-256 digest in hex characters.
const SHA256_HEX_WIDTH: usize = 64;

/// Additional validation of downloaded release content.
///
/// Implementations check `payload` (the downloaded bytes) against `proof`
/// (the bytes of the validation asset) and name the validation asset they
/// expect for a given release filename.
///
/// Validators that validate *validation assets* too (multistep validation)
/// override [`is_recursive`](Validator::is_recursive) and
/// [`must_continue_validation`](Validator::must_continue_validation); the
/// defaults describe a single-step validator.
pub trait Validator: Send + Sync {
    /// Validates `payload` named `filename` against the validation asset
    /// bytes in `proof`.
    ///
    /// # Errors
    ///
    /// A validation-failed error specific to the validator kind; see the
    /// individual implementations.
    fn validate(&self, filename: &str, payload: &[u8], proof: &[u8]) -> Result<()>;

    /// Returns the name of the validation asset for `release_filename`.
    ///
    /// If the release does not carry an asset of that name, detection fails
    /// with [`BinupError::ValidationAssetNotFound`].
    fn validation_asset_name(&self, release_filename: &str) -> String;

    /// True when this validator may validate validation assets as well.
    fn is_recursive(&self) -> bool {
        false
    }

    /// True when validation must continue on `filename` (i.e. the file is a
    /// validation asset that itself needs validating).
    fn must_continue_validation(&self, _filename: &str) -> bool {
        false
    }
}

// ====================================================================================================================

/// SHA-256 digest validator: the validation asset holds the hex digest of
/// the release asset (conventionally `<asset>.sha256`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaValidator;

impl Validator for ShaValidator {
    /// # Errors
    ///
    /// [`BinupError::IncorrectChecksumFile`] when `proof` is shorter than
    /// one hex-encoded digest; [`BinupError::ChecksumMismatch`] when the
    /// recorded digest is not valid hex or does not match.
    fn validate(&self, _filename: &str, payload: &[u8], proof: &[u8]) -> Result<()> {
        if proof.len() < SHA256_HEX_WIDTH {
            return Err(BinupError::IncorrectChecksumFile);
        }
        check_hex_digest(&proof[..SHA256_HEX_WIDTH], payload)
    }

    fn validation_asset_name(&self, release_filename: &str) -> String {
        format!("{release_filename}.sha256")
    }
}

/// Compares the hex digest in `expected` against the SHA-256 of `payload`.
fn check_hex_digest(expected: &[u8], payload: &[u8]) -> Result<()> {
    let digest = Sha256::digest(payload);
    let expected = String::from_utf8_lossy(expected).into_owned();
    let matched = expected.len() == SHA256_HEX_WIDTH
        && hex::decode(&expected).is_ok_and(|bytes| bytes == digest.as_slice());
    if matched {
        Ok(())
    } else {
        Err(BinupError::ChecksumMismatch { expected, found: hex::encode(digest) })
    }
}

// ====================================================================================================================

/// SHA-256 checksum-list validator: all digests live in one text file
/// (`checksums.txt`, `SHA256SUMS`, ...), one `<hex><two spaces><filename>`
/// pair per line, LF or CRLF terminated.
///
/// The two-space separator is deliberate: it is what `sha256sum` emits, and
/// files using a single space or a tab are rejected as malformed.
#[derive(Debug, Clone)]
pub struct ChecksumValidator {
    unique_filename: String,
}

impl ChecksumValidator {
    /// Creates a validator reading digests from the named checksums file.
    #[must_use]
    pub fn new(unique_filename: impl Into<String>) -> Self {
        Self { unique_filename: unique_filename.into() }
    }
}

impl Validator for ChecksumValidator {
    /// # Errors
    ///
    /// [`BinupError::IncorrectChecksumFile`] for undecodable or malformed
    /// lines, [`BinupError::HashNotFound`] when `filename` has no entry,
    /// [`BinupError::ChecksumMismatch`] when the recorded digest differs.
    fn validate(&self, filename: &str, payload: &[u8], proof: &[u8]) -> Result<()> {
        let hash = find_checksum(filename, proof)?;
        ShaValidator.validate(filename, payload, hash.as_bytes())
    }

    fn validation_asset_name(&self, _release_filename: &str) -> String {
        self.unique_filename.clone()
    }
}

/// Looks up the hex digest recorded for `filename` in a checksum list.
fn find_checksum(filename: &str, content: &[u8]) -> Result<String> {
    let content = std::str::from_utf8(content).map_err(|_| BinupError::IncorrectChecksumFile)?;
    // detect windows line endings from the content rather than the platform
    let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = content.split(eol).collect();
    debug!(checksums = lines.len(), %filename, "searching checksum file");
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split("  ").collect();
        if parts.len() != 2 {
            return Err(BinupError::IncorrectChecksumFile);
        }
        if parts[1] == filename {
            return Ok(parts[0].to_string());
        }
    }
    Err(BinupError::HashNotFound { filename: filename.to_string() })
}

// ====================================================================================================================

/// ECDSA (P-256) signature validator: the validation asset holds a
/// DER-encoded two-integer signature over the SHA-256 of the release asset
/// (conventionally `<asset>.sig`).
#[derive(Debug, Clone, Default)]
pub struct EcdsaValidator {
    public_key: Option<VerifyingKey>,
}

impl EcdsaValidator {
    /// Creates a validator for the given public key.
    #[must_use]
    pub fn new(public_key: VerifyingKey) -> Self {
        Self { public_key: Some(public_key) }
    }

    /// Creates a validator from a PEM-encoded (SPKI) public key, the form
    /// `openssl ec -pubout` emits.
    ///
    /// # Errors
    ///
    /// [`BinupError::Config`] when the PEM data does not hold a P-256
    /// public key. Configuration problems fail fast, before any download.
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        let public_key = VerifyingKey::from_public_key_pem(pem).map_err(|err| {
            BinupError::Config { message: format!("failed to parse ECDSA public key: {err}") }
        })?;
        Ok(Self::new(public_key))
    }
}

impl Validator for EcdsaValidator {
    /// # Errors
    ///
    /// [`BinupError::InvalidSignature`] for undecodable DER,
    /// [`BinupError::NoPublicKey`] when no key was configured,
    /// [`BinupError::SignatureVerificationFailed`] when the signature does
    /// not verify.
    fn validate(&self, filename: &str, payload: &[u8], proof: &[u8]) -> Result<()> {
        debug!(%filename, "verifying ECDSA signature");
        let signature = Signature::from_der(proof).map_err(|_| BinupError::InvalidSignature)?;
        let Some(public_key) = &self.public_key else {
            return Err(BinupError::NoPublicKey);
        };
        public_key
            .verify(payload, &signature)
            .map_err(|_| BinupError::SignatureVerificationFailed { scheme: "ECDSA" })
    }

    fn validation_asset_name(&self, release_filename: &str) -> String {
        format!("{release_filename}.sig")
    }
}

// ====================================================================================================================

/// Detached OpenPGP signature validator.
///
/// Verifies the validation asset as a detached signature over the release
/// asset, against a configured set of trusted keys (primary keys and their
/// subkeys). Armored `.asc` signatures are the default; call
/// [`binary`](Self::binary) for binary `.sig` files.
#[derive(Debug, Default)]
pub struct PgpValidator {
    keyring: Vec<SignedPublicKey>,
    binary: bool,
}

impl PgpValidator {
    /// Creates a validator with an empty keyring; [`validate`] fails with
    /// [`BinupError::NoKeyRing`] until one is configured.
    ///
    /// [`validate`]: Validator::validate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the trusted keys from armored key data.
    ///
    /// # Errors
    ///
    /// [`BinupError::Config`] when the key data cannot be parsed.
    pub fn with_armored_keyring(mut self, keyring: &[u8]) -> Result<Self> {
        let (keys, _) = SignedPublicKey::from_armor_many(Cursor::new(keyring)).map_err(|err| {
            BinupError::Config { message: format!("failed to read armored keyring: {err}") }
        })?;
        self.keyring = keys.collect::<std::result::Result<Vec<_>, _>>().map_err(|err| {
            BinupError::Config { message: format!("failed to read armored keyring: {err}") }
        })?;
        Ok(self)
    }

    /// Toggles between binary `.sig` and armored `.asc` signature files.
    #[must_use]
    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
}

impl Validator for PgpValidator {
    /// # Errors
    ///
    /// [`BinupError::NoKeyRing`] when no keyring was configured,
    /// [`BinupError::InvalidSignature`] when the signature bytes do not
    /// parse (including truncated input),
    /// [`BinupError::SignatureVerificationFailed`] when no trusted key
    /// verifies the signature.
    fn validate(&self, filename: &str, payload: &[u8], proof: &[u8]) -> Result<()> {
        if self.keyring.is_empty() {
            return Err(BinupError::NoKeyRing);
        }
        debug!(%filename, "verifying PGP signature");
        let signature = if self.binary {
            StandaloneSignature::from_bytes(Cursor::new(proof))
                .map_err(|_| BinupError::InvalidSignature)?
        } else {
            StandaloneSignature::from_armor_single(Cursor::new(proof))
                .map_err(|_| BinupError::InvalidSignature)?
                .0
        };
        for key in &self.keyring {
            if signature.verify(key, payload).is_ok() {
                return Ok(());
            }
            for subkey in &key.public_subkeys {
                if signature.verify(subkey, payload).is_ok() {
                    return Ok(());
                }
            }
        }
        Err(BinupError::SignatureVerificationFailed { scheme: "PGP" })
    }

    fn validation_asset_name(&self, release_filename: &str) -> String {
        if self.binary {
            format!("{release_filename}.sig")
        } else {
            format!("{release_filename}.asc")
        }
    }
}

// ====================================================================================================================

/// Routes filenames to sub-validators by glob pattern.
///
/// Rules are matched in insertion order, so add general patterns like `"*"`
/// last. [`skip_validation`](Self::skip_validation) rules are placed ahead
/// of all others: signature files legitimately need no validation, and
/// skipping them is what prevents a router from validating its own proof
/// material forever.
///
/// Unlike the other validators this one is recursive: when a checksums file
/// is itself covered by a rule, the update pipeline keeps validating hop by
/// hop (asset → checksums file → signature). Depending on the configured
/// rules that can loop; the chain builder aborts after
/// [`MAX_VALIDATION_CHAIN_LENGTH`] hops.
///
/// ```no_run
/// use binup::validate::{ChecksumValidator, PatternValidator, PgpValidator};
///
/// # fn example(key: &[u8]) -> binup::Result<PatternValidator> {
/// PatternValidator::new()
///     // "SHA256SUMS" is checked by its PGP signature ("SHA256SUMS.asc")
///     .add("SHA256SUMS", PgpValidator::new().with_armored_keyring(key)?)?
///     // every other asset is checked by the "SHA256SUMS" file
///     .add("*", ChecksumValidator::new("SHA256SUMS"))?
///     // the signature file itself is not checked
///     .skip_validation("*.asc")
/// # }
/// ```
#[derive(Default)]
pub struct PatternValidator {
    rules: Vec<(Pattern, Option<Box<dyn Validator>>)>,
}

impl PatternValidator {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a validator to the given glob pattern.
    ///
    /// # Errors
    ///
    /// [`BinupError::Config`] for invalid glob syntax.
    pub fn add(mut self, glob: &str, validator: impl Validator + 'static) -> Result<Self> {
        let pattern = compile_glob(glob)?;
        self.rules.push((pattern, Some(Box::new(validator))));
        Ok(self)
    }

    /// Exempts files matching the given glob pattern from validation.
    ///
    /// Skip rules are moved ahead of the validation rules so they match
    /// first regardless of insertion order.
    ///
    /// # Errors
    ///
    /// [`BinupError::Config`] for invalid glob syntax.
    pub fn skip_validation(mut self, glob: &str) -> Result<Self> {
        let pattern = compile_glob(glob)?;
        self.rules.insert(0, (pattern, None));
        Ok(self)
    }

    fn find_rule(&self, filename: &str) -> Option<&Option<Box<dyn Validator>>> {
        self.rules.iter().find(|(pattern, _)| pattern.matches(filename)).map(|(_, rule)| rule)
    }
}

impl Validator for PatternValidator {
    /// Delegates to the first matching rule.
    ///
    /// # Errors
    ///
    /// [`BinupError::ValidatorNotFound`] when no pattern matches; otherwise
    /// whatever the matched sub-validator returns. A skip rule validates
    /// nothing and always succeeds.
    fn validate(&self, filename: &str, payload: &[u8], proof: &[u8]) -> Result<()> {
        match self.find_rule(filename) {
            Some(Some(validator)) => validator.validate(filename, payload, proof),
            // this file does not need to be validated
            Some(None) => Ok(()),
            None => Err(BinupError::ValidatorNotFound { filename: filename.to_string() }),
        }
    }

    fn validation_asset_name(&self, release_filename: &str) -> String {
        match self.find_rule(release_filename) {
            Some(Some(validator)) => validator.validation_asset_name(release_filename),
            // a skipped file "validates" against itself: a name known to exist.
            // an unmatched file also maps to itself so that the error surfaces
            // from validate, which can report it with context
            Some(None) | None => release_filename.to_string(),
        }
    }

    fn is_recursive(&self) -> bool {
        true
    }

    fn must_continue_validation(&self, filename: &str) -> bool {
        match self.find_rule(filename) {
            Some(Some(validator)) => {
                !validator.is_recursive() || validator.must_continue_validation(filename)
            }
            _ => false,
        }
    }
}

fn compile_glob(glob: &str) -> Result<Pattern> {
    Pattern::new(glob).map_err(|err| BinupError::Config {
        message: format!("invalid glob pattern {glob:?}: {err}"),
    })
}

// ====================================================================================================================

/// Checks assets with a checksums file (e.g. `SHA256SUMS`) and the
/// checksums file with a DER ECDSA signature (e.g. `SHA256SUMS.sig`).
///
/// # Errors
///
/// [`BinupError::Config`] when the key or a glob pattern is invalid.
pub fn checksum_with_ecdsa_validator(
    checksums_filename: &str,
    public_key_pem: &str,
) -> Result<PatternValidator> {
    PatternValidator::new()
        .add(checksums_filename, EcdsaValidator::from_public_key_pem(public_key_pem)?)?
        .add("*", ChecksumValidator::new(checksums_filename))?
        .skip_validation("*.sig")
}

/// Checks assets with a checksums file (e.g. `SHA256SUMS`) and the
/// checksums file with an armored PGP signature (e.g. `SHA256SUMS.asc`).
///
/// # Errors
///
/// [`BinupError::Config`] when the keyring or a glob pattern is invalid.
pub fn checksum_with_pgp_validator(
    checksums_filename: &str,
    armored_keyring: &[u8],
) -> Result<PatternValidator> {
    PatternValidator::new()
        .add(checksums_filename, PgpValidator::new().with_armored_keyring(armored_keyring)?)?
        .add("*", ChecksumValidator::new(checksums_filename))?
        .skip_validation("*.asc")
}
