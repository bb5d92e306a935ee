use bytes::Bytes;
use parking_lot::Mutex;
use satchel_core::prelude::*;
use satchel_mock::{MockFailure, MockProvider};
use satchel_runtime::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == event).count()
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "satchel_runtime=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn bundles(provider: MockProvider) -> Bundles<MockProvider> {
    init_tracing();
    Bundles::new(provider, ProjectSettings::default())
}

fn observed<T: 'static>(events: &Events) -> (
    impl FnOnce(&T) + Send + 'static,
    impl FnOnce(&ErrorMessage) + Send + 'static,
    impl FnOnce() + Send + 'static,
) {
    let (success, error, last) = (events.clone(), events.clone(), events.clone());
    (
        move |_: &T| success.push("success"),
        move |e: &ErrorMessage| error.push(format!("error {}", e.detail())),
        move || last.push("final"),
    )
}

#[tokio::test]
async fn zero_size_download_succeeds_with_false_and_no_progress() {
    let provider = MockProvider::new().with_asset("ui/button.png", "png");
    let events = Events::default();
    let progress = events.clone();
    let (success, error, last) = observed::<bool>(&events);

    let handle = bundles(provider.clone())
        .download_dependencies(["ui/button.png"])
        .on_progress(move |_| progress.push("progress"))
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    assert_eq!(handle.result().as_deref(), Some(&false));
    assert_eq!(events.all(), vec!["success", "final"]);
    assert!(handle.is_released());
    assert!(provider.all_released_once());
    assert!(provider.operations_of(OperationKind::Download).is_empty());
}

#[tokio::test(start_paused = true)]
async fn positive_download_reports_progress_up_to_total() {
    let provider = MockProvider::new()
        .with_remote_asset("level1/terrain.bin", vec![0u8; 16], &["level1"], 1000)
        .with_remote_asset("level1/props.bin", vec![0u8; 16], &["level1"], 24)
        .with_latency(Duration::from_millis(10))
        .with_download_chunks(4);
    let events = Events::default();
    let snapshots = Arc::new(Mutex::new(Vec::<ProgressData>::new()));
    let before = Arc::new(Mutex::new(None));

    let (progress_events, progress_log, sizes) = (events.clone(), snapshots.clone(), before.clone());
    let (success, error, last) = observed::<bool>(&events);
    let handle = bundles(provider.clone())
        .download_dependencies(["level1"])
        .on_before_download(move |size| *sizes.lock() = Some(size))
        .on_progress(move |p| {
            progress_events.push("progress");
            progress_log.lock().push(p);
        })
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    assert_eq!(handle.result().as_deref(), Some(&true));
    assert_eq!(*before.lock(), Some(1024));

    let all = events.all();
    assert!(events.count("progress") >= 1);
    assert_eq!(&all[all.len() - 2..], ["success", "final"]);
    assert!(all[..all.len() - 2].iter().all(|e| e == "progress"));

    let snapshots = snapshots.lock();
    let last = snapshots.last().copied().unwrap();
    assert!(last.is_done);
    assert_eq!(last.total_value, 1024);
    assert_eq!(last.current_value, last.total_value);
    assert!(snapshots.iter().all(|p| (0.0..=1.0).contains(&p.completed_percent())));

    assert!(provider.is_downloaded("level1/terrain.bin"));
    assert!(provider.all_released_once());
    assert_eq!(provider.operations_of(OperationKind::Download).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_before_done_still_finalizes_and_releases() {
    let provider = MockProvider::new()
        .with_remote_asset("big.bin", vec![0u8; 4], &["big"], 4096)
        .with_latency(Duration::from_millis(50));
    let events = Events::default();
    let (success, error, last) = observed::<bool>(&events);

    let handle = bundles(provider.clone())
        .download_dependencies(["big"])
        .on_success(success)
        .on_error(error)
        .on_final(last);
    handle.cancel();

    assert_eq!(handle.wait().await, HandleState::Canceled);
    assert_eq!(
        handle.error().map(|e| e.kind()),
        Some(ErrorKind::DownloadCanceled)
    );
    assert_eq!(events.all(), vec!["error download canceled", "final"]);
    assert!(handle.result().is_none());
    assert!(provider.all_released_once());
    assert!(!provider.is_downloaded("big.bin"));
}

#[tokio::test(start_paused = true)]
async fn cancel_during_progress_polling_releases_both_operations() {
    let provider = MockProvider::new()
        .with_remote_asset("big.bin", vec![0u8; 4], &["big"], 4096)
        .with_latency(Duration::from_millis(20))
        .with_download_chunks(16);
    let events = Events::default();
    let progress = events.clone();
    let (success, error, last) = observed::<bool>(&events);

    let handle = bundles(provider.clone())
        .download_dependencies(["big"])
        .on_progress(move |_| progress.push("progress"))
        .on_success(success)
        .on_error(error)
        .on_final(last);

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, HandleState::Canceled);
    assert!(events.count("progress") >= 1);
    assert_eq!(events.count("success"), 0);
    assert_eq!(events.count("final"), 1);
    assert_eq!(provider.operations_of(OperationKind::DownloadSize).len(), 1);
    assert_eq!(provider.operations_of(OperationKind::Download).len(), 1);
    assert!(provider.all_released_once());

    // Canceling a finished handle changes nothing.
    handle.cancel();
    assert_eq!(handle.state(), HandleState::Canceled);
}

#[tokio::test(start_paused = true)]
async fn download_failure_reports_error_then_final() {
    let provider = MockProvider::new()
        .with_remote_asset("a.bin", vec![1u8; 4], &["pack"], 512)
        .with_latency(Duration::from_millis(5))
        .failing(MockFailure::Download);
    let events = Events::default();
    let (success, error, last) = observed::<bool>(&events);

    let handle = bundles(provider.clone())
        .download_dependencies(["pack"])
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Failed);
    let error = handle.error().unwrap();
    assert_eq!(error.kind(), ErrorKind::DownloadFailed);
    assert_eq!(error.category(), "dependence");
    assert_eq!(events.all(), vec!["error download failed", "final"]);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn missing_asset_is_reported_as_not_found() {
    let provider = MockProvider::new();
    let events = Events::default();
    let (success, error, last) = observed::<Bytes>(&events);

    let handle = bundles(provider.clone())
        .load_asset::<Bytes>("nope")
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Failed);
    let error = handle.error().unwrap();
    assert_eq!(error.category(), "error");
    assert_eq!(error.detail(), "asset not found");
    assert_eq!(error.kind(), ErrorKind::AssetNotFound);
    assert_eq!(events.count("success"), 0);
    assert_eq!(events.all(), vec!["error asset not found", "final"]);
    assert!(provider.all_released_once());
}

#[derive(Debug, Deserialize, PartialEq)]
struct Weapon {
    name: String,
    damage: u32,
}

#[tokio::test]
async fn loads_typed_assets() {
    let provider = MockProvider::new()
        .with_asset("weapons/sword.json", r#"{"name": "sword", "damage": 12}"#)
        .with_asset("text/intro.txt", "hello");
    let bundles = bundles(provider.clone());

    let sword = bundles.load_asset::<Json<Weapon>>("weapons/sword.json");
    let intro = bundles.load_asset::<String>("text/intro.txt");

    assert_eq!(sword.wait().await, HandleState::Succeeded);
    assert_eq!(intro.wait().await, HandleState::Succeeded);
    assert_eq!(sword.result().unwrap().damage, 12);
    assert_eq!(sword.result().unwrap().name, "sword");
    assert_eq!(intro.result().unwrap().as_str(), "hello");
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn undecodable_asset_reads_as_not_found() {
    let provider = MockProvider::new().with_asset("weapons/broken.json", "{not json");

    let handle = bundles(provider).load_asset::<Json<Weapon>>("weapons/broken.json");

    assert_eq!(handle.wait().await, HandleState::Failed);
    assert_eq!(handle.error().unwrap().detail(), "asset not found");
}

#[tokio::test]
async fn instantiate_checks_the_asset_first() {
    let provider = MockProvider::new()
        .with_prefab("prefabs/crate.prefab")
        .with_asset("textures/wood.png", "png");
    let bundles = bundles(provider.clone());

    let created = bundles.instantiate("prefabs/crate.prefab", true);
    let missing = bundles.instantiate("prefabs/ghost.prefab", false);
    let not_prefab = bundles.instantiate("textures/wood.png", false);

    assert_eq!(created.wait().await, HandleState::Succeeded);
    let instance = created.result().unwrap();
    assert_eq!(instance.name, "crate");
    assert_eq!(instance.key, "prefabs/crate.prefab");

    assert_eq!(missing.wait().await, HandleState::Failed);
    assert_eq!(missing.error().unwrap().kind(), ErrorKind::AssetNotFound);

    assert_eq!(not_prefab.wait().await, HandleState::Failed);
    assert_eq!(
        not_prefab.error().unwrap().kind(),
        ErrorKind::InstantiateFailed
    );

    // the missing prefab never reached the instantiate step
    assert_eq!(provider.operations_of(OperationKind::Instantiate).len(), 2);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn instantiate_failure_is_surfaced() {
    let provider = MockProvider::new()
        .with_prefab("prefabs/crate.prefab")
        .failing(MockFailure::Instantiate);

    let handle = bundles(provider.clone()).instantiate("prefabs/crate.prefab", false);

    assert_eq!(handle.wait().await, HandleState::Failed);
    assert_eq!(handle.error().unwrap().kind(), ErrorKind::InstantiateFailed);
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn scene_load_without_progress_observer_completes() {
    let provider = MockProvider::new()
        .with_scene("scenes/forest.scene", 2048)
        .with_latency(Duration::from_millis(10));
    let events = Events::default();
    let sizes = events.clone();
    let (success, error, last) = observed::<SceneInstance>(&events);

    let handle = bundles(provider.clone())
        .load_scene("scenes/forest.scene", LoadSceneMode::Additive)
        .on_before_download(move |size| sizes.push(format!("download {size}")))
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    assert_eq!(events.all(), vec!["download 2048", "success", "final"]);
    let scene = handle.result().unwrap();
    assert_eq!(scene.name, "forest");
    assert_eq!(scene.mode, LoadSceneMode::Additive);
    assert_eq!(provider.loaded_scenes(), vec![(*scene).clone()]);
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn scene_load_with_progress_ends_done() {
    let provider = MockProvider::new()
        .with_scene("scenes/city.scene", 300)
        .with_latency(Duration::from_millis(10))
        .with_download_chunks(3);
    let snapshots = Arc::new(Mutex::new(Vec::<ProgressData>::new()));
    let log = snapshots.clone();

    let handle = bundles(provider.clone())
        .load_scene("scenes/city.scene", LoadSceneMode::Single)
        .on_progress(move |p| log.lock().push(p));

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    let last = snapshots.lock().last().copied().unwrap();
    assert!(last.is_done);
    assert_eq!(last.current_value, 300);
    assert_eq!(last.total_value, 300);
}

#[tokio::test]
async fn missing_scene_fails_to_load() {
    let provider = MockProvider::new();

    let handle = bundles(provider.clone()).load_scene("scenes/void.scene", LoadSceneMode::Single);

    assert_eq!(handle.wait().await, HandleState::Failed);
    assert_eq!(handle.error().unwrap().kind(), ErrorKind::SceneLoadFailed);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn unload_scene_round_trip() {
    let provider = MockProvider::new().with_scene("scenes/menu.scene", 0);
    let bundles = bundles(provider.clone());

    let loaded = bundles.load_scene("scenes/menu.scene", LoadSceneMode::Single);
    assert_eq!(loaded.wait().await, HandleState::Succeeded);
    let scene = (*loaded.result().unwrap()).clone();

    let unload = bundles.unload_scene(scene.clone());
    assert_eq!(unload.wait().await, HandleState::Succeeded);
    assert!(unload.error().is_none());
    assert!(provider.loaded_scenes().is_empty());

    let again = bundles.unload_scene(scene);
    assert_eq!(again.wait().await, HandleState::Failed);
    assert_eq!(again.error().unwrap().kind(), ErrorKind::SceneUnloadFailed);
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn independent_handles_do_not_interleave_their_callbacks() {
    let slow = MockProvider::new()
        .with_asset("slow.txt", "slow")
        .with_latency(Duration::from_millis(50));
    let fast = MockProvider::new()
        .with_asset("fast.txt", "fast")
        .with_latency(Duration::from_millis(5));
    let events = Events::default();

    let (a_success, a_final) = (events.clone(), events.clone());
    let a = bundles(slow)
        .load_asset::<String>("slow.txt")
        .on_success(move |_| a_success.push("a success"))
        .on_final(move || a_final.push("a final"));
    let (b_success, b_final) = (events.clone(), events.clone());
    let b = bundles(fast)
        .load_asset::<String>("fast.txt")
        .on_success(move |_| b_success.push("b success"))
        .on_final(move || b_final.push("b final"));

    let (a_state, b_state) = tokio::join!(a.wait(), b.wait());
    assert_eq!((a_state, b_state), (HandleState::Succeeded, HandleState::Succeeded));

    let pos = |e| events.position(e).unwrap();
    assert!(pos("a success") < pos("a final"));
    assert!(pos("b success") < pos("b final"));
    assert!(pos("b final") < pos("a success"));
}

#[tokio::test]
async fn late_observers_are_replayed() {
    let provider = MockProvider::new().with_asset("a.txt", "a");
    let handle = bundles(provider).load_asset::<String>("a.txt");
    handle.wait().await;

    let events = Events::default();
    let (success, error, last) = observed::<String>(&events);
    let _ = handle.on_success(success).on_error(error).on_final(last);

    assert_eq!(events.all(), vec!["success", "final"]);
}

#[tokio::test(start_paused = true)]
async fn zero_progress_interval_is_clamped() {
    init_tracing();
    let provider = MockProvider::new()
        .with_remote_asset("big.bin", vec![0u8; 4], &["big"], 100)
        .with_scene("scenes/cave.scene", 100)
        .with_latency(Duration::from_millis(5))
        .with_download_chunks(4);
    let events = Events::default();
    let (download_progress, scene_progress) = (events.clone(), events.clone());

    let download = DownloadDependenciesHandler::builder(provider.clone())
        .with_labels(["big"])
        .with_progress_interval(Duration::ZERO)
        .build()
        .on_progress(move |_| download_progress.push("download progress"));
    let scene = LoadSceneHandler::builder(provider.clone())
        .with_asset_key("scenes/cave.scene")
        .with_mode(LoadSceneMode::Additive)
        .with_progress_interval(Duration::ZERO)
        .build()
        .on_progress(move |_| scene_progress.push("scene progress"));

    assert_eq!(download.wait().await, HandleState::Succeeded);
    assert_eq!(download.result().as_deref(), Some(&true));
    assert_eq!(scene.wait().await, HandleState::Succeeded);
    assert!(events.count("download progress") >= 1);
    assert!(events.count("scene progress") >= 1);
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn progress_observer_added_mid_download_sees_ticks() {
    let provider = MockProvider::new()
        .with_remote_asset("big.bin", vec![0u8; 4], &["big"], 4096)
        .with_latency(Duration::from_millis(20))
        .with_download_chunks(16);
    let snapshots = Arc::new(Mutex::new(Vec::<ProgressData>::new()));
    let log = snapshots.clone();

    let handle = bundles(provider.clone()).download_dependencies(["big"]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let handle = handle.on_progress(move |p| log.lock().push(p));

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    let snapshots = snapshots.lock();
    assert!(snapshots.len() > 1);
    assert!(snapshots.iter().any(|p| !p.is_done));
    assert!(snapshots.last().unwrap().is_done);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_scene_progress_releases_and_loads_nothing() {
    let provider = MockProvider::new()
        .with_scene("scenes/forest.scene", 4096)
        .with_latency(Duration::from_millis(20))
        .with_download_chunks(16);
    let events = Events::default();
    let progress = events.clone();
    let (success, error, last) = observed::<SceneInstance>(&events);

    let handle = bundles(provider.clone())
        .load_scene("scenes/forest.scene", LoadSceneMode::Single)
        .on_progress(move |_| progress.push("progress"))
        .on_success(success)
        .on_error(error)
        .on_final(last);

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, HandleState::Canceled);
    assert_eq!(handle.error().map(|e| e.kind()), Some(ErrorKind::Canceled));
    assert!(events.count("progress") >= 1);
    assert_eq!(events.count("success"), 0);
    assert_eq!(events.count("error scene load canceled"), 1);
    assert_eq!(events.count("final"), 1);
    assert_eq!(provider.operations_of(OperationKind::LoadScene).len(), 1);
    assert!(provider.loaded_scenes().is_empty());
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn cancel_asset_load_before_done() {
    let provider = MockProvider::new()
        .with_asset("text/intro.txt", "hello")
        .with_latency(Duration::from_millis(50));
    let events = Events::default();
    let (success, error, last) = observed::<String>(&events);

    let handle = bundles(provider.clone())
        .load_asset::<String>("text/intro.txt")
        .on_success(success)
        .on_error(error)
        .on_final(last);
    handle.cancel();

    assert_eq!(handle.wait().await, HandleState::Canceled);
    assert_eq!(handle.error().map(|e| e.kind()), Some(ErrorKind::Canceled));
    assert_eq!(events.all(), vec!["error asset load canceled", "final"]);
    assert!(handle.result().is_none());
    assert!(provider.all_released_once());
}

#[tokio::test(start_paused = true)]
async fn cancel_between_instantiate_steps() {
    let provider = MockProvider::new()
        .with_prefab("prefabs/crate.prefab")
        .with_latency(Duration::from_millis(30));
    let events = Events::default();
    let (success, error, last) = observed::<Instance>(&events);

    let handle = bundles(provider.clone())
        .instantiate("prefabs/crate.prefab", false)
        .on_success(success)
        .on_error(error)
        .on_final(last);

    // the check finishes at 30ms, the instantiate step would at 60ms
    tokio::time::sleep(Duration::from_millis(45)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, HandleState::Canceled);
    assert_eq!(events.all(), vec!["error instantiate canceled", "final"]);
    assert_eq!(provider.operations_of(OperationKind::LoadAsset).len(), 1);
    assert_eq!(provider.operations_of(OperationKind::Instantiate).len(), 1);
    assert_eq!(provider.released_assets(), vec!["prefabs/crate.prefab"]);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn instantiate_releases_the_checked_payload() {
    let provider = MockProvider::new().with_prefab("prefabs/crate.prefab");
    let bundles = bundles(provider.clone());

    let created = bundles.instantiate("prefabs/crate.prefab", false);
    assert_eq!(created.wait().await, HandleState::Succeeded);
    assert_eq!(provider.released_assets(), vec!["prefabs/crate.prefab"]);

    let missing = bundles.instantiate("prefabs/ghost.prefab", false);
    assert_eq!(missing.wait().await, HandleState::Failed);
    assert_eq!(
        provider.released_assets(),
        vec!["prefabs/crate.prefab", "prefabs/ghost.prefab"]
    );
}

#[tokio::test(start_paused = true)]
async fn scene_loads_when_its_size_is_unknown() {
    let provider = MockProvider::new()
        .with_scene("scenes/forest.scene", 512)
        .with_latency(Duration::from_millis(10))
        .failing(MockFailure::DownloadSize);
    let events = Events::default();
    let sizes = events.clone();
    let (success, error, last) = observed::<SceneInstance>(&events);

    let handle = bundles(provider.clone())
        .load_scene("scenes/forest.scene", LoadSceneMode::Single)
        .on_before_download(move |size| sizes.push(format!("download {size}")))
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Succeeded);
    assert_eq!(events.all(), vec!["success", "final"]);
    assert_eq!(provider.operations_of(OperationKind::DownloadSize).len(), 1);
    assert_eq!(provider.loaded_scenes().len(), 1);
    assert!(provider.all_released_once());
}

#[tokio::test]
async fn empty_scene_key_fails_without_touching_the_provider() {
    let provider = MockProvider::new();
    let events = Events::default();
    let (success, error, last) = observed::<SceneInstance>(&events);

    let handle = bundles(provider.clone())
        .load_scene("  ", LoadSceneMode::Single)
        .on_success(success)
        .on_error(error)
        .on_final(last);

    assert_eq!(handle.wait().await, HandleState::Failed);
    assert_eq!(handle.error().unwrap().kind(), ErrorKind::SceneLoadFailed);
    assert_eq!(events.all(), vec!["error empty scene key", "final"]);
    assert!(provider.operations().is_empty());
}
