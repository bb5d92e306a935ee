use satchel_core::prelude::*;
use satchel_mock::{MockFailure, MockProvider};
use satchel_runtime::{BundlesError, bootstrap, load_settings, prelude::*};
use std::time::Duration;

fn remote_settings(labels: &[&str]) -> ProjectSettings {
    ProjectSettings {
        remote_bundle: true,
        preload_labels: labels.iter().map(|l| l.to_string()).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn initialize_registers_keys_and_catalog_updates() {
    let provider = MockProvider::new()
        .with_asset("a.png", "a")
        .with_asset("b.png", "b")
        .with_catalog_update("remote-catalog", &["c.png", "d.png", "c.png"]);
    let mut bundles = Bundles::new(provider, ProjectSettings::default());
    assert!(!bundles.is_initialized());

    let report = bundles.initialize().await.unwrap();

    assert!(bundles.is_initialized());
    assert_eq!(report.asset_keys, 2);
    assert!(bundles.asset_keys().contains("a.png"));
    assert_eq!(report.updated_catalogs, vec!["remote-catalog"]);
    assert_eq!(
        bundles.updated_catalogs().iter().collect::<Vec<_>>(),
        vec!["c.png", "d.png"]
    );
    assert!(report.errors.is_empty());
    assert_eq!(report.preloaded, None);
}

#[tokio::test]
async fn initialize_twice_keeps_registries_deduplicated() {
    let provider = MockProvider::new().with_asset("a.png", "a");
    let mut bundles = Bundles::new(provider, ProjectSettings::default());

    bundles.initialize().await.unwrap();
    bundles.initialize().await.unwrap();

    assert_eq!(bundles.asset_keys().len(), 1);
}

#[tokio::test]
async fn catalog_failures_do_not_block_initialization() {
    let provider = MockProvider::new()
        .with_asset("a.png", "a")
        .failing(MockFailure::CatalogCheck);
    let mut bundles = Bundles::new(provider, ProjectSettings::default());

    let report = bundles.initialize().await.unwrap();

    assert!(bundles.is_initialized());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind(), ErrorKind::CatalogCheckFailed);

    let provider = MockProvider::new()
        .with_catalog_update("remote", &["x"])
        .failing(MockFailure::CatalogUpdate);
    let mut bundles = Bundles::new(provider, ProjectSettings::default());
    let report = bundles.initialize().await.unwrap();

    assert!(bundles.is_initialized());
    assert!(bundles.updated_catalogs().is_empty());
    assert_eq!(report.errors[0].kind(), ErrorKind::CatalogUpdateFailed);
}

#[tokio::test]
async fn provider_initialize_failure_is_an_error() {
    let provider = MockProvider::new().failing(MockFailure::Initialize);
    let mut bundles = Bundles::new(provider, ProjectSettings::default());

    let result = bundles.initialize().await;

    assert!(matches!(result, Err(BundlesError::Initialize(_))));
    assert!(!bundles.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn remote_bundles_preload_their_labels() {
    let provider = MockProvider::new()
        .with_remote_asset("ui/atlas.png", "atlas", &["ui"], 256)
        .with_latency(Duration::from_millis(5));
    let mut bundles = Bundles::new(provider.clone(), remote_settings(&["ui"]));

    let report = bundles.initialize().await.unwrap();

    assert_eq!(report.preloaded, Some(true));
    assert!(provider.is_downloaded("ui/atlas.png"));
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn failed_preload_still_initializes() {
    let provider = MockProvider::new()
        .with_remote_asset("ui/atlas.png", "atlas", &["ui"], 256)
        .failing(MockFailure::Download);
    let mut bundles = Bundles::new(provider, remote_settings(&["ui"]));

    let report = bundles.initialize().await.unwrap();

    assert!(bundles.is_initialized());
    assert_eq!(report.preloaded, None);
    assert_eq!(report.errors[0].kind(), ErrorKind::DownloadFailed);
}

#[tokio::test]
async fn local_bundles_skip_preload() {
    let provider = MockProvider::new().with_remote_asset("ui/atlas.png", "atlas", &["ui"], 256);
    let settings = ProjectSettings {
        remote_bundle: false,
        ..remote_settings(&["ui"])
    };
    let mut bundles = Bundles::new(provider.clone(), settings);

    bundles.initialize().await.unwrap();

    assert!(provider.operations().is_empty());
    assert!(!provider.is_downloaded("ui/atlas.png"));
}

#[tokio::test]
async fn download_size_query_releases_its_operation() {
    let provider = MockProvider::new()
        .with_remote_asset("ui/atlas.png", "atlas", &["ui"], 256)
        .with_remote_asset("ui/font.ttf", "font", &["ui"], 64);
    let bundles = Bundles::new(provider.clone(), ProjectSettings::default());

    let size = bundles.download_size(["ui"]).await.unwrap();

    assert_eq!(size, 320);
    assert_eq!(provider.operations_of(OperationKind::DownloadSize).len(), 1);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn release_asset_reaches_the_provider() {
    let provider = MockProvider::new().with_asset("a.png", "a");
    let bundles = Bundles::new(provider.clone(), ProjectSettings::default());

    bundles.release_asset("a.png");

    assert_eq!(provider.released_assets(), vec!["a.png"]);
}

#[tokio::test]
async fn bootstrap_reads_settings_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("satchel.json");
    tokio::fs::write(
        &path,
        br#"{"remote_bundle": true, "preload_labels": ["ui"], "progress_interval_ms": 5}"#,
    )
    .await
    .unwrap();
    let provider = MockProvider::new().with_remote_asset("ui/atlas.png", "atlas", &["ui"], 64);

    let (bundles, report) = bootstrap(provider.clone(), &path).await.unwrap();

    assert!(bundles.is_initialized());
    assert_eq!(bundles.settings().progress_interval_ms, 5);
    assert_eq!(report.preloaded, Some(true));
    assert!(provider.is_downloaded("ui/atlas.png"));
}

#[tokio::test]
async fn missing_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let settings = load_settings(dir.path().join("absent.json")).await.unwrap();

    assert_eq!(settings, ProjectSettings::default());
}

#[tokio::test]
async fn malformed_settings_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("satchel.json");
    tokio::fs::write(&path, b"{ nope").await.unwrap();

    let result = load_settings(&path).await;

    assert!(matches!(result, Err(BundlesError::Settings(_))));
}
