//! Architecture candidate and asset-suffix generation.
//!
//! Release assets are conventionally named `<cmd>_<os>_<arch><ext>`, but the
//! architecture token a publisher picks is not always the one the running
//! binary reports: `x86_64` vs `amd64`, or the `armv5`/`armv6`/`armv7`
//! family where a binary built for a lower revision also runs on a higher
//! one. This module produces the ordered list of *additional* architecture
//! tokens worth trying, most specific first, and the full set of filename
//! suffixes to match assets against.
//!
//! Both functions are pure: no configuration, no hidden state, fully
//! testable in isolation. The literal configured architecture (and the
//! optional universal token) are appended by the selector, never here:
//! the more specific tokens are less likely to produce false positives,
//! so they have to be scanned first.

const MIN_ARM: u8 = 5;
const MAX_ARM: u8 = 7;

/// Filename extensions an asset may carry, in dispatch priority order.
///
/// The empty extension (a raw executable) is last. `.tar.gz` appears before
/// `.gz` so that the longer suffix is matched first.
pub const ASSET_EXTENSIONS: [&str; 9] =
    [".zip", ".tar.gz", ".tgz", ".gzip", ".gz", ".tar.xz", ".xz", ".bz2", ""];

/// The two separators in conventional use between name, os and arch tokens.
pub const SEPARATORS: [char; 2] = ['_', '-'];

/// Returns the additional architecture tokens to try before the literal one.
///
/// - `arch == "arm"` with an ARM sub-version in `5..=7` yields
///   `armv{n}` tokens descending from the given sub-version down to
///   `armv5`: a binary built for a lower revision is acceptable on a newer
///   CPU, never the reverse.
/// - `arch == "amd64"` additionally yields `x86_64`, and `x86_64` yields
///   `amd64`: the two names are interchangeable in the wild and which one
///   a publisher uses mostly depends on their toolchain.
/// - Anything else yields no additional candidates.
///
/// An ARM sub-version of 0 means "unknown" and is ignored, as is anything
/// outside the 5–7 range.
#[must_use]
pub fn additional_arches(arch: &str, arm: u8) -> Vec<String> {
    let mut additional = Vec::with_capacity((MAX_ARM - MIN_ARM) as usize + 1);
    if arch == "arm" && (MIN_ARM..=MAX_ARM).contains(&arm) {
        for version in (MIN_ARM..=arm).rev() {
            additional.push(format!("armv{version}"));
        }
    }
    if arch == "amd64" {
        additional.push("x86_64".to_string());
    }
    if arch == "x86_64" {
        additional.push("amd64".to_string());
    }
    additional
}

/// Builds every filename suffix an asset for `os`/`arch` may end with.
///
/// For each separator and each entry of [`ASSET_EXTENSIONS`] this emits
/// `{os}{sep}{arch}{ext}`; on Windows targets `{os}{sep}{arch}.exe{ext}`
/// is emitted as well. That is exactly `2 × 9` entries per pair, doubled
/// on Windows.
#[must_use]
pub fn candidate_suffixes(os: &str, arch: &str) -> Vec<String> {
    let mut suffixes = Vec::with_capacity(SEPARATORS.len() * ASSET_EXTENSIONS.len() * 2);
    for sep in SEPARATORS {
        for ext in ASSET_EXTENSIONS {
            suffixes.push(format!("{os}{sep}{arch}{ext}"));
            if os == "windows" {
                suffixes.push(format!("{os}{sep}{arch}.exe{ext}"));
            }
        }
    }
    suffixes
}
