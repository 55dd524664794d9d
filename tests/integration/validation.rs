//! Validation chains end-to-end, and the nesting-depth guard.

use std::fs;

use binup::validate::{ChecksumValidator, PatternValidator, ShaValidator};
use binup::{BinupError, Config, Repository, SourceRelease, Updater};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::{checksum_file, release, sha256_hex, targz, MockSource};

const NEW_BINARY: &[u8] = b"new binary";

fn updater_with(source: MockSource, validator: impl binup::Validator + 'static) -> Updater {
    Updater::new(Config {
        source: Some(Box::new(source)),
        validator: Some(Box::new(validator)),
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        ..Config::default()
    })
    .unwrap()
}

fn repo() -> Repository {
    Repository::parse_slug("owner/app")
}

#[tokio::test]
async fn a_checksum_protected_update_goes_through() {
    crate::common::init_tracing();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old binary").unwrap();

    let archive = targz(&[("app", NEW_BINARY)]);
    let checksums = checksum_file(&[("app_linux_amd64.tar.gz", &archive)]);
    let source = MockSource::new(vec![release(
        "v1.1.0",
        &[(11, "app_linux_amd64.tar.gz"), (12, "checksums.txt")],
    )])
    .with_file(11, archive)
    .with_file(12, checksums);

    let updater = updater_with(source, ChecksumValidator::new("checksums.txt"));
    updater.update_command(&CancellationToken::new(), &target, "1.0.0", &repo()).await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), NEW_BINARY);
}

#[tokio::test]
async fn a_tampered_asset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old binary").unwrap();

    let archive = targz(&[("app", NEW_BINARY)]);
    // the checksum file records a digest of *different* bytes, as it would
    // after the asset was swapped out from under it
    let mut tampered = archive.clone();
    tampered[0] ^= 0xff;
    let checksums = checksum_file(&[("app_linux_amd64.tar.gz", &tampered)]);

    let source = MockSource::new(vec![release(
        "v1.1.0",
        &[(11, "app_linux_amd64.tar.gz"), (12, "checksums.txt")],
    )])
    .with_file(11, archive)
    .with_file(12, checksums);

    let updater = updater_with(source, ChecksumValidator::new("checksums.txt"));
    let err = updater
        .update_command(&CancellationToken::new(), &target, "1.0.0", &repo())
        .await
        .unwrap_err();

    // the error names the asset and wraps the digest mismatch
    match err {
        BinupError::Validation { name, source } => {
            assert_eq!(name, "app_linux_amd64.tar.gz");
            assert!(matches!(*source, BinupError::ChecksumMismatch { .. }));
        }
        other => panic!("expected a validation error, got {other}"),
    }
    // nothing was applied
    assert_eq!(fs::read(&target).unwrap(), b"old binary");
}

#[tokio::test]
async fn a_missing_validation_asset_fails_at_detection() {
    let source = MockSource::new(vec![release("v1.1.0", &[(11, "app_linux_amd64.tar.gz")])]);
    let updater = updater_with(source, ChecksumValidator::new("checksums.txt"));

    let err = updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap_err();
    assert!(matches!(err, BinupError::ValidationAssetNotFound { name } if name == "checksums.txt"));
}

#[tokio::test]
async fn the_sha256_companion_file_validates_the_asset() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, b"old binary").unwrap();

    let archive = targz(&[("app", NEW_BINARY)]);
    let digest = sha256_hex(&archive).into_bytes();
    let source = MockSource::new(vec![release(
        "v1.1.0",
        &[(11, "app_linux_amd64.tar.gz"), (12, "app_linux_amd64.tar.gz.sha256")],
    )])
    .with_file(11, archive)
    .with_file(12, digest);

    let updater = updater_with(source, ShaValidator);
    updater.update_command(&CancellationToken::new(), &target, "1.0.0", &repo()).await.unwrap();
    assert_eq!(fs::read(&target).unwrap(), NEW_BINARY);
}

/// A release whose assets form an endless `.sha256` ladder.
fn sha_ladder_release(depth: usize) -> SourceRelease {
    let mut names = vec!["app_linux_amd64.tar.gz".to_string()];
    for _ in 0..depth {
        names.push(format!("{}.sha256", names.last().unwrap()));
    }
    let assets: Vec<(i64, &str)> = names
        .iter()
        .enumerate()
        .map(|(index, name)| (index as i64 + 1, name.as_str()))
        .collect();
    release("v1.0.0", &assets)
}

#[tokio::test]
async fn a_self_feeding_router_hits_the_nesting_guard() {
    // every file, including each .sha256 proof, routes back into the
    // digest validator: the expected names keep growing and the chain
    // never terminates on its own
    let validator = PatternValidator::new().add("*", ShaValidator).unwrap();
    let updater = updater_with(MockSource::new(vec![sha_ladder_release(25)]), validator);

    let err = updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap_err();
    assert!(matches!(err, BinupError::ValidationChainTooLong { max: 20 }));
}

#[tokio::test]
async fn a_chain_of_exactly_twenty_hops_is_accepted() {
    // same ladder, but the twentieth proof is exempt from validation, so
    // the chain terminates right at the guard without tripping it
    let twentieth = format!("app_linux_amd64.tar.gz{}", ".sha256".repeat(20));
    let validator = PatternValidator::new()
        .skip_validation(&twentieth)
        .unwrap()
        .add("*", ShaValidator)
        .unwrap();
    let updater = updater_with(MockSource::new(vec![sha_ladder_release(25)]), validator);

    let detected =
        updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().unwrap();
    assert_eq!(detected.validation_chain.len(), 20);
}
