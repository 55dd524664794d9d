//! The full pipeline against a file on disk.

use std::fs;

use binup::{BinupError, Config, Repository, UpdateOutcome, Updater};
use semver::Version;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::common::{release, targz, MockSource};

const OLD_BINARY: &[u8] = b"old binary";
const NEW_BINARY: &[u8] = b"new binary";

fn source_with_release() -> MockSource {
    let archive = targz(&[("app", NEW_BINARY)]);
    MockSource::new(vec![release("v1.1.0", &[(11, "app_linux_amd64.tar.gz")])])
        .with_file(11, archive)
}

fn updater_for(source: MockSource) -> Updater {
    Updater::new(Config {
        source: Some(Box::new(source)),
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
async fn updates_the_target_binary() {
    crate::common::init_tracing();
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let updater = updater_for(source_with_release());
    let outcome = updater
        .update_command(&CancellationToken::new(), &target, "1.0.0", &repo())
        .await
        .unwrap();

    match outcome {
        UpdateOutcome::Updated { release } => {
            assert_eq!(release.version(), &Version::new(1, 1, 0));
        }
        UpdateOutcome::UpToDate { .. } => panic!("expected an update"),
    }
    assert_eq!(fs::read(&target).unwrap(), NEW_BINARY);
    // clean update: no staging file, no old binary left behind
    assert!(!dir.path().join(".app.new").exists());
    assert!(!dir.path().join(".app.old").exists());
}

#[tokio::test]
async fn matching_version_short_circuits() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let updater = updater_for(source_with_release());
    let outcome = updater
        .update_command(&CancellationToken::new(), &target, "1.1.0", &repo())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::UpToDate { version } if version == Version::new(1, 1, 0)));
    assert_eq!(fs::read(&target).unwrap(), OLD_BINARY);
}

#[tokio::test]
async fn no_release_short_circuits_with_the_current_version() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let updater = updater_for(MockSource::new(Vec::new()));
    let outcome = updater
        .update_command(&CancellationToken::new(), &target, "1.0.0", &repo())
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::UpToDate { version } if version == Version::new(1, 0, 0)));
    assert_eq!(fs::read(&target).unwrap(), OLD_BINARY);
}

#[tokio::test]
async fn an_invalid_current_version_fails_before_any_network_call() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let updater = updater_for(source_with_release());
    let err = updater
        .update_command(&CancellationToken::new(), &target, "not-a-version", &repo())
        .await
        .unwrap_err();
    assert!(matches!(err, BinupError::InvalidVersion { .. }));
}

#[tokio::test]
async fn the_old_binary_can_be_parked() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();
    let parked = dir.path().join("app.previous");

    let updater = Updater::new(Config {
        source: Some(Box::new(source_with_release())),
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        old_save_path: Some(parked.clone()),
        ..Config::default()
    })
    .unwrap();

    updater.update_command(&CancellationToken::new(), &target, "1.0.0", &repo()).await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), NEW_BINARY);
    assert_eq!(fs::read(&parked).unwrap(), OLD_BINARY);
}

#[cfg(unix)]
#[tokio::test]
async fn a_symlinked_target_updates_the_real_file() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("app-1.0.0");
    fs::write(&real, OLD_BINARY).unwrap();
    let link = dir.path().join("app");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let updater = updater_for(source_with_release());
    updater.update_command(&CancellationToken::new(), &link, "1.0.0", &repo()).await.unwrap();

    // the link still points at the real file, which got the new content
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read(&real).unwrap(), NEW_BINARY);
}

#[tokio::test]
async fn a_raw_asset_needs_no_decompression() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let source = MockSource::new(vec![release("v1.1.0", &[(21, "app_linux_amd64")])])
        .with_file(21, NEW_BINARY.to_vec());
    let updater = updater_for(source);
    updater.update_command(&CancellationToken::new(), &target, "1.0.0", &repo()).await.unwrap();

    assert_eq!(fs::read(&target).unwrap(), NEW_BINARY);
}

#[tokio::test]
async fn an_archive_without_the_executable_fails() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let archive = targz(&[("README.md", b"docs only")]);
    let source = MockSource::new(vec![release("v1.1.0", &[(31, "app_linux_amd64.tar.gz")])])
        .with_file(31, archive);
    let updater = updater_for(source);

    let err = updater
        .update_command(&CancellationToken::new(), &target, "1.0.0", &repo())
        .await
        .unwrap_err();
    assert!(matches!(err, BinupError::ExecutableNotFound { .. }));
    // the target is untouched
    assert_eq!(fs::read(&target).unwrap(), OLD_BINARY);
}

#[tokio::test]
async fn cancellation_aborts_the_pipeline() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("app");
    fs::write(&target, OLD_BINARY).unwrap();

    let updater = updater_for(source_with_release());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err =
        updater.update_command(&cancel, &target, "1.0.0", &repo()).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(fs::read(&target).unwrap(), OLD_BINARY);
}
