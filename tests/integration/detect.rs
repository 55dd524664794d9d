//! Release detection against mock release lists.

use binup::{BinupError, Config, Repository, Updater};
use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::common::{prerelease, release, MockSource};

fn updater_for(source: MockSource, os: &str, arch: &str) -> Updater {
    Updater::new(Config {
        source: Some(Box::new(source)),
        os: os.to_string(),
        arch: arch.to_string(),
        ..Config::default()
    })
    .unwrap()
}

fn repo() -> Repository {
    Repository::parse_slug("owner/app")
}

#[tokio::test]
async fn default_config_skips_the_prerelease() {
    let source = MockSource::new(vec![
        release("v1.0.0", &[(1, "app_linux_amd64.tar.gz")]),
        prerelease("v1.1.0-beta", &[(2, "app_linux_amd64.tar.gz")]),
    ]);
    let updater = updater_for(source, "linux", "amd64");

    let detected =
        updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().unwrap();
    assert_eq!(detected.version(), &Version::new(1, 0, 0));
    assert_eq!(detected.asset_name, "app_linux_amd64.tar.gz");
    assert_eq!(detected.asset_id, 1);
    assert!(!detected.asset_url.is_empty());
}

#[tokio::test]
async fn an_explicit_version_finds_the_prerelease_anyway() {
    let source = MockSource::new(vec![
        release("v1.0.0", &[(1, "app_linux_amd64.tar.gz")]),
        prerelease("v1.1.0-beta", &[(2, "app_linux_amd64.tar.gz")]),
    ]);
    let updater = updater_for(source, "linux", "amd64");

    let detected = updater
        .detect_version(&CancellationToken::new(), &repo(), "v1.1.0-beta")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detected.version(), &Version::parse("1.1.0-beta").unwrap());
    assert_eq!(detected.asset_id, 2);
    assert!(detected.prerelease);
}

#[tokio::test]
async fn admitting_prereleases_picks_the_newer_beta() {
    let source = MockSource::new(vec![
        release("v1.0.0", &[(1, "app_linux_amd64.tar.gz")]),
        prerelease("v1.1.0-beta", &[(2, "app_linux_amd64.tar.gz")]),
    ]);
    let updater = Updater::new(Config {
        source: Some(Box::new(source)),
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        prerelease: true,
        ..Config::default()
    })
    .unwrap();

    let detected =
        updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().unwrap();
    assert_eq!(detected.version(), &Version::parse("1.1.0-beta").unwrap());
}

#[tokio::test]
async fn windows_asset_with_embedded_exe_is_matched_for_its_arch_only() {
    let releases = vec![release("v1.0.0", &[(1, "tool_windows_amd64.exe.zip")])];

    let updater = updater_for(MockSource::new(releases.clone()), "windows", "amd64");
    assert!(updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().is_some());

    let updater = updater_for(MockSource::new(releases), "windows", "arm64");
    assert!(updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().is_none());
}

#[tokio::test]
async fn no_matching_release_is_none_not_an_error() {
    let source = MockSource::new(vec![release("v1.0.0", &[(1, "app_linux_arm64.tar.gz")])]);
    let updater = updater_for(source, "linux", "amd64");
    assert!(updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().is_none());

    let updater = updater_for(MockSource::new(Vec::new()), "linux", "amd64");
    assert!(updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().is_none());
}

#[tokio::test]
async fn tags_without_semver_disqualify_the_release() {
    let source = MockSource::new(vec![
        release("nightly", &[(1, "app_linux_amd64.tar.gz")]),
        release("v0.9.0", &[(2, "app_linux_amd64.tar.gz")]),
    ]);
    let updater = updater_for(source, "linux", "amd64");

    let detected =
        updater.detect_latest(&CancellationToken::new(), &repo()).await.unwrap().unwrap();
    assert_eq!(detected.version(), &Version::new(0, 9, 0));
}

#[tokio::test]
async fn detection_reports_cancellation() {
    let source = MockSource::new(vec![release("v1.0.0", &[(1, "app_linux_amd64.tar.gz")])]);
    let updater = updater_for(source, "linux", "amd64");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = updater.detect_latest(&cancel, &repo()).await.unwrap_err();
    assert!(matches!(err, BinupError::Cancelled));
}
