//! Archive decompression and executable discovery.
//!
//! Release assets arrive in whatever container the publisher chose: a zip,
//! a gzipped or xz'd tarball, a single-member gzip/xz/bzip2 stream, or a
//! raw executable with no container at all. This module picks the codec
//! from the asset's filename extension and locates the one entry that is
//! the executable, returning its decompressed bytes.
//!
//! Format dispatch walks a fixed, ordered suffix list so that `.tar.gz` is
//! recognized before a bare `.gz` would spuriously match. An asset with no
//! known extension is passed through untouched: it is assumed to *be* the
//! executable.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::arch::SEPARATORS;
use crate::error::{BinupError, Result};

type Decompressor = fn(&[u8], &str, &str, &str) -> Result<Vec<u8>>;

/// Known archive suffixes, in dispatch priority order: first match wins.
const FILE_TYPES: [(&str, Decompressor); 8] = [
    (".zip", unzip),
    (".tar.gz", untar_gz),
    (".tgz", untar_gz),
    (".gzip", gunzip),
    (".gz", gunzip),
    (".tar.xz", untar_xz),
    (".xz", unxz),
    (".bz2", unbz2),
];

/// Decompresses a downloaded asset and returns the executable's bytes.
///
/// The archive format is detected from `url` (the asset URL, or simply a
/// filename with an extension); the match is case-insensitive. `cmd` is
/// the logical command name used to recognize the executable among the
/// archive entries (see the naming rule on [`match_executable_name`]);
/// `os` and `arch` are the target platform tokens the asset was selected
/// for. A `url` with no recognized extension returns `data` unchanged.
///
/// # Errors
///
/// - [`BinupError::CannotDecompress`] when the codec rejects the data
///   (corrupt or truncated archive)
/// - [`BinupError::ExecutableNotFound`] when the archive decodes fine but
///   no entry matches the executable naming rule
pub fn decompress_command(
    data: Vec<u8>,
    url: &str,
    cmd: &str,
    os: &str,
    arch: &str,
) -> Result<Vec<u8>> {
    let lowered = url.to_lowercase();
    for (extension, decompress) in FILE_TYPES {
        if lowered.ends_with(extension) {
            return decompress(&data, cmd, os, arch);
        }
    }
    debug!("file is not compressed");
    Ok(data)
}

/// True when `target` is the executable named `cmd` for the given platform.
///
/// A candidate matches if it equals `cmd` or `cmd.exe`, or if for a single
/// separator (`_` or `-`) it equals the full-name form
/// `{cmd}{sep}{os}{sep}{arch}` or `{cmd}{sep}{version}{sep}{os}{sep}{arch}`
/// (any version token), with `.exe` appended on Windows targets. Both
/// sides are lower-cased first; the comparison is exact, never a substring
/// search.
fn match_executable_name(cmd: &str, os: &str, arch: &str, target: &str) -> bool {
    let target = target.to_lowercase();
    let cmd = cmd.to_lowercase();
    let os = os.to_lowercase();
    let arch = arch.to_lowercase();

    if target == cmd || target == format!("{cmd}.exe") {
        return true;
    }

    let exe = if os == "windows" { ".exe" } else { "" };
    for sep in SEPARATORS {
        let tail = format!("{sep}{os}{sep}{arch}{exe}");
        if target == format!("{cmd}{tail}") {
            return true;
        }
        if let Some(rest) = target.strip_prefix(&format!("{cmd}{sep}")) {
            if rest.strip_suffix(&tail).is_some_and(|infix| !infix.is_empty()) {
                return true;
            }
        }
    }
    false
}

/// Last path segment of an archive entry name.
fn base_name(entry: &str) -> &str {
    entry.rsplit(['/', '\\']).next().unwrap_or(entry)
}

fn cannot_decompress(format: &'static str, err: impl std::fmt::Display) -> BinupError {
    BinupError::CannotDecompress { format, reason: err.to_string() }
}

fn unzip(data: &[u8], cmd: &str, os: &str, arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing zip file");

    // the zip directory sits at the end of the file, so the whole asset has
    // to be in memory before any entry can be read
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|err| cannot_decompress("zip", err))?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|err| cannot_decompress("zip", err))?;
        if file.is_dir() {
            continue;
        }
        let name = base_name(file.name()).to_string();
        if match_executable_name(cmd, os, arch, &name) {
            debug!(entry = %file.name(), "executable found in zip archive");
            let mut executable = Vec::new();
            file.read_to_end(&mut executable).map_err(|err| cannot_decompress("zip", err))?;
            return Ok(executable);
        }
    }
    Err(BinupError::ExecutableNotFound { cmd: cmd.to_string() })
}

fn untar_gz(data: &[u8], cmd: &str, os: &str, arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing tar.gz file");
    scan_tar(GzDecoder::new(data), "tar.gz", cmd, os, arch)
}

fn untar_xz(data: &[u8], cmd: &str, os: &str, arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing tar.xz file");
    scan_tar(xz2::read::XzDecoder::new(data), "tar.xz", cmd, os, arch)
}

fn scan_tar<R: Read>(
    reader: R,
    format: &'static str,
    cmd: &str,
    os: &str,
    arch: &str,
) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|err| cannot_decompress(format, err))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| cannot_decompress(format, err))?;
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if path.ends_with('/') {
            continue;
        }
        if match_executable_name(cmd, os, arch, base_name(&path)) {
            debug!(entry = %path, "executable found in tar archive");
            let mut executable = Vec::new();
            entry.read_to_end(&mut executable).map_err(|err| cannot_decompress(format, err))?;
            return Ok(executable);
        }
    }
    Err(BinupError::ExecutableNotFound { cmd: cmd.to_string() })
}

fn gunzip(data: &[u8], cmd: &str, os: &str, arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing gzip file");

    let mut decoder = GzDecoder::new(data);
    let mut executable = Vec::new();
    decoder.read_to_end(&mut executable).map_err(|err| cannot_decompress("gzip", err))?;

    // gzip carries the original filename in its header; a single-member
    // stream with the wrong name is somebody else's file
    let name = decoder
        .header()
        .and_then(flate2::GzHeader::filename)
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_default();
    if !match_executable_name(cmd, os, arch, &name) {
        return Err(BinupError::ExecutableNotFound { cmd: cmd.to_string() });
    }
    debug!(%name, "executable found in gzip file");
    Ok(executable)
}

fn unxz(data: &[u8], cmd: &str, _os: &str, _arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing xz file");

    let mut decoder = xz2::read::XzDecoder::new(data);
    let mut executable = Vec::new();
    decoder.read_to_end(&mut executable).map_err(|err| cannot_decompress("xz", err))?;

    // xz has no embedded filename; the stream is assumed to be the executable
    debug!(%cmd, "decompressed file from xz is assumed to be an executable");
    Ok(executable)
}

fn unbz2(data: &[u8], cmd: &str, _os: &str, _arch: &str) -> Result<Vec<u8>> {
    debug!("decompressing bzip2 file");

    let mut decoder = bzip2::read::BzDecoder::new(data);
    let mut executable = Vec::new();
    decoder.read_to_end(&mut executable).map_err(|err| cannot_decompress("bzip2", err))?;

    debug!(%cmd, "decompressed file from bzip2 is assumed to be an executable");
    Ok(executable)
}
