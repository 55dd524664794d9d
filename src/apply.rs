//! Atomic binary replacement.
//!
//! Replacing the file a program is currently running from is the one step
//! of the pipeline that can leave the machine worse off than before, so
//! the sequence here is deliberately rigid:
//!
//! 1. Read the whole new executable into memory; verify its checksum
//!    and/or signature if requested; any failure aborts before the
//!    filesystem is touched
//! 2. Write the payload to a hidden sibling `.{name}.new` with the target
//!    mode, and close it (Windows cannot rename an open file)
//! 3. Remove any stale `.{name}.old` left behind by an earlier attempt
//! 4. Rename the target to the old path. On failure the target is still
//!    intact, only the `.new` file remains as debris
//! 5. Rename the `.new` file onto the target. On failure the old binary
//!    is renamed back, and if *that* fails too the distinguished
//!    [`BinupError::RollbackFailed`] tells the caller the filesystem needs
//!    manual recovery
//! 6. Delete the old binary, or keep it where
//!    [`ApplyOptions::old_save_path`] says; a deletion failure (the old
//!    binary may still be mapped into the running process) hides the file
//!    instead of failing the update
//!
//! There is no file locking: two concurrent applies to the same target are
//! the caller's race to lose.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{BinupError, Result};

/// Options for [`apply`].
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Path of the file to update. `None` means the resolved path of the
    /// running executable.
    pub target_path: Option<PathBuf>,

    /// File mode for the replacement (Unix only). 0 falls back to `0o755`.
    pub target_mode: u32,

    /// SHA-256 checksum the new executable must have. `None` skips the
    /// checksum verification at this layer.
    pub checksum: Option<Vec<u8>>,

    /// Public key for signature verification. Setting a key without a
    /// signature (or the reverse) is a configuration error.
    pub public_key: Option<VerifyingKey>,

    /// DER-encoded ECDSA signature over the SHA-256 of the new executable.
    pub signature: Option<Vec<u8>>,

    /// Keep the replaced binary at this path after a successful update.
    /// `None` deletes it.
    pub old_save_path: Option<PathBuf>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            target_path: None,
            target_mode: 0o755,
            checksum: None,
            public_key: None,
            signature: None,
            old_save_path: None,
        }
    }
}

/// Replaces the target executable with the contents of `new`.
///
/// See the module documentation for the exact sequence and its failure
/// modes. On success the target path holds the new executable with the
/// configured mode; on failure the target path still holds a valid
/// executable, unless the returned error is
/// [`BinupError::RollbackFailed`], which callers must check for.
///
/// # Errors
///
/// Verification errors ([`BinupError::ChecksumMismatch`],
/// [`BinupError::InvalidSignature`],
/// [`BinupError::SignatureVerificationFailed`], [`BinupError::Config`])
/// before any filesystem mutation; [`BinupError::Io`] for filesystem
/// failures; [`BinupError::RollbackFailed`] when the swap broke and could
/// not be undone.
pub fn apply(mut new: impl Read, opts: &ApplyOptions) -> Result<()> {
    match (&opts.signature, &opts.public_key) {
        (Some(_), None) => {
            return Err(BinupError::Config {
                message: "no public key to verify signature with".to_string(),
            });
        }
        (None, Some(_)) => {
            return Err(BinupError::Config {
                message: "no signature to verify with".to_string(),
            });
        }
        _ => {}
    }

    let mut new_bytes = Vec::new();
    new.read_to_end(&mut new_bytes)?;

    if let Some(expected) = &opts.checksum {
        verify_checksum(&new_bytes, expected)?;
    }
    if let (Some(signature), Some(public_key)) = (&opts.signature, &opts.public_key) {
        verify_signature(&new_bytes, signature, public_key)?;
    }

    let target_path = match &opts.target_path {
        Some(path) => path.clone(),
        None => executable_path()?,
    };
    let update_dir = target_path.parent().ok_or_else(|| BinupError::Config {
        message: format!("target path {} has no parent directory", target_path.display()),
    })?;
    let filename = target_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| BinupError::Config {
            message: format!("target path {} has no filename", target_path.display()),
        })?;

    let mode = if opts.target_mode == 0 { 0o755 } else { opts.target_mode };
    let new_path = update_dir.join(format!(".{filename}.new"));
    debug!(path = %new_path.display(), "writing the new executable");
    write_new_file(&new_path, &new_bytes, mode)?;

    let (old_path, remove_old) = match &opts.old_save_path {
        Some(path) => (path.clone(), false),
        None => (update_dir.join(format!(".{filename}.old")), true),
    };

    swap_executable(&target_path, &new_path, &old_path, remove_old)
}

/// Resolved path of the running executable, symlinks followed.
pub(crate) fn executable_path() -> Result<PathBuf> {
    let path = std::env::current_exe()?;
    Ok(fs::canonicalize(path)?)
}

fn verify_checksum(payload: &[u8], expected: &[u8]) -> Result<()> {
    let digest = Sha256::digest(payload);
    if digest.as_slice() == expected {
        Ok(())
    } else {
        Err(BinupError::ChecksumMismatch {
            expected: hex::encode(expected),
            found: hex::encode(digest),
        })
    }
}

fn verify_signature(payload: &[u8], signature: &[u8], public_key: &VerifyingKey) -> Result<()> {
    let signature = Signature::from_der(signature).map_err(|_| BinupError::InvalidSignature)?;
    public_key
        .verify(payload, &signature)
        .map_err(|_| BinupError::SignatureVerificationFailed { scheme: "ECDSA" })
}

fn write_new_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    // the file must be fully closed before the rename, or Windows considers
    // it still in use
    drop(file);
    Ok(())
}

/// The rename dance: target -> old, new -> target, with rollback.
fn swap_executable(
    target_path: &Path,
    new_path: &Path,
    old_path: &Path,
    remove_old: bool,
) -> Result<()> {
    // a stale old file from a retried update would make the rename fail on
    // Windows, and after a successful update the running process may keep
    // the previous one alive
    let _ = fs::remove_file(old_path);

    fs::rename(target_path, old_path)?;

    if let Err(update) = fs::rename(new_path, target_path) {
        // the target path holds nothing right now; put the old binary back
        warn!(target = %target_path.display(), "failed to move the new executable in place, rolling back");
        return Err(match fs::rename(old_path, target_path) {
            Ok(()) => update.into(),
            Err(rollback) => BinupError::RollbackFailed { update, rollback },
        });
    }

    if remove_old && fs::remove_file(old_path).is_err() {
        // happens on Windows while the old binary is still mapped into the
        // running process: hide it instead
        let _ = hide_file(old_path);
    }
    Ok(())
}

#[cfg(windows)]
fn hide_file(path: &Path) -> std::io::Result<()> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileAttributesW, SetFileAttributesW, FILE_ATTRIBUTE_HIDDEN, INVALID_FILE_ATTRIBUTES,
    };

    let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    // SAFETY: `wide` is a NUL-terminated UTF-16 path that outlives both calls
    unsafe {
        let attributes = GetFileAttributesW(wide.as_ptr());
        if attributes == INVALID_FILE_ATTRIBUTES {
            return Err(std::io::Error::last_os_error());
        }
        if SetFileAttributesW(wide.as_ptr(), attributes | FILE_ATTRIBUTE_HIDDEN) == 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(windows))]
#[allow(clippy::unnecessary_wraps)]
fn hide_file(_path: &Path) -> std::io::Result<()> {
    // the old file is dot-prefixed, which is as hidden as it gets here
    Ok(())
}
