//! # Mock Preload Example
//!
//! Drives every handle type against the in-memory provider: preload during
//! initialization, a labeled download with progress, a canceled download,
//! a scene round trip, a typed asset load and an instantiate.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example mock_preload --features "mock"
//! ```

use satchel::prelude::*;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Difficulty {
    lives: u32,
    enemy_speed: f32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let provider = MockProvider::new()
        .with_remote_asset("ui/atlas.png", "atlas", &["ui"], 64 * 1024)
        .with_remote_asset("audio/theme.ogg", "theme", &["audio"], 512 * 1024)
        .with_remote_asset("audio/boss.ogg", "boss", &["audio"], 768 * 1024)
        .with_asset("data/difficulty.json", r#"{"lives": 3, "enemy_speed": 1.5}"#)
        .with_scene("levels/forest.scene", 256 * 1024)
        .with_prefab("prefabs/tree.prefab")
        .with_latency(Duration::from_millis(40))
        .with_download_chunks(8);

    let settings = ProjectSettings {
        remote_bundle: true,
        preload_labels: vec!["ui".to_string()],
        ..Default::default()
    };
    let mut bundles = Bundles::new(provider.clone(), settings);
    let report = bundles.initialize().await?;
    println!(
        "Initialized: {} keys, preloaded: {:?}",
        report.asset_keys, report.preloaded
    );

    let theme = bundles
        .download_dependencies(["audio"])
        .on_before_download(|size| println!("audio needs {size} bytes"))
        .on_progress(|p| println!("audio {:>5.1}%", p.completed_percent() * 100.0))
        .on_success(|downloaded| println!("audio downloaded: {downloaded}"))
        .on_final(|| println!("audio done"));
    theme.wait().await;

    let canceled = bundles
        .download_dependencies(["levels/forest.scene"])
        .on_error(|e| println!("forest download: {e}"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    canceled.cancel();
    canceled.wait().await;

    let forest = bundles
        .load_scene("levels/forest.scene", LoadSceneMode::Single)
        .on_progress(|p| println!("forest {:>5.1}%", p.completed_percent() * 100.0));
    forest.wait().await;
    if let Some(scene) = forest.result() {
        println!("Loaded scene {} (#{})", scene.name, scene.id);
        bundles.unload_scene(scene.as_ref().clone()).wait().await;
    }

    let difficulty = bundles.load_asset::<Json<Difficulty>>("data/difficulty.json");
    difficulty.wait().await;
    if let Some(difficulty) = difficulty.result() {
        println!(
            "{} lives, enemy speed {}",
            difficulty.lives, difficulty.enemy_speed
        );
    }

    let tree = bundles
        .instantiate("prefabs/tree.prefab", true)
        .on_success(|instance| println!("Spawned {} (#{})", instance.name, instance.id));
    tree.wait().await;

    println!(
        "{} operations, all released once: {}",
        provider.operations().len(),
        provider.all_released_once()
    );

    Ok(())
}
