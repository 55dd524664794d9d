//! Shared fixtures: an in-memory release source and archive builders.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use binup::{BinupError, Release, Repository, Result, Source, SourceAsset, SourceRelease};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// Routes library tracing into the test output (`--nocapture`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A release source serving canned releases and asset bytes.
pub struct MockSource {
    releases: Vec<SourceRelease>,
    files: HashMap<i64, Vec<u8>>,
}

impl MockSource {
    pub fn new(releases: Vec<SourceRelease>) -> Self {
        Self { releases, files: HashMap::new() }
    }

    /// Registers the downloadable content of an asset ID.
    pub fn with_file(mut self, asset_id: i64, content: Vec<u8>) -> Self {
        self.files.insert(asset_id, content);
        self
    }
}

#[async_trait]
impl Source for MockSource {
    async fn list_releases(
        &self,
        cancel: &CancellationToken,
        _repository: &Repository,
    ) -> Result<Vec<SourceRelease>> {
        if cancel.is_cancelled() {
            return Err(BinupError::Cancelled);
        }
        Ok(self.releases.clone())
    }

    async fn download_release_asset(
        &self,
        cancel: &CancellationToken,
        _release: &Release,
        asset_id: i64,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(BinupError::Cancelled);
        }
        self.files.get(&asset_id).cloned().ok_or_else(|| BinupError::SourceResponse {
            operation: format!("downloading asset {asset_id}"),
            reason: "no content registered for this asset".to_string(),
        })
    }
}

/// A published release with the given tag and `(id, name)` assets.
pub fn release(tag: &str, assets: &[(i64, &str)]) -> SourceRelease {
    SourceRelease {
        id: 1,
        name: tag.to_string(),
        tag_name: tag.to_string(),
        url: format!("https://example.com/releases/{tag}"),
        draft: false,
        prerelease: false,
        published_at: None,
        release_notes: String::new(),
        assets: assets
            .iter()
            .map(|(id, name)| SourceAsset {
                id: *id,
                name: (*name).to_string(),
                size: 0,
                url: format!("https://example.com/download/{tag}/{name}"),
            })
            .collect(),
    }
}

/// Same as [`release`], flagged as a pre-release.
pub fn prerelease(tag: &str, assets: &[(i64, &str)]) -> SourceRelease {
    SourceRelease { prerelease: true, ..release(tag, assets) }
}

/// Builds a gzipped tarball from `(name, content)` entries.
pub fn targz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::default(),
    ));
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Hex SHA-256 of `data`, as a checksum file records it.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A `sha256sum`-style checksum file covering the given entries.
pub fn checksum_file(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, content) in entries {
        writeln!(out, "{}  {name}", sha256_hex(content)).unwrap();
    }
    out
}
