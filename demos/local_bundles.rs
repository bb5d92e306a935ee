//! # Local Bundles Example
//!
//! Writes a small bundle directory, then bootstraps it through the file
//! system provider and loads from it.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example local_bundles --features "fs"
//! ```

use bytes::Bytes;
use satchel::fs::{BlobStore, content_hash};
use satchel::prelude::*;
use std::collections::HashMap;

const ROOT: &str = "demo_bundles";

async fn write_bundle(store: &BlobStore) -> anyhow::Result<()> {
    let files: [(&str, &'static [u8], AssetKind); 3] = [
        ("ui/title.txt", b"Welcome to the forest", AssetKind::Asset),
        ("levels/forest.scene", b"forest", AssetKind::Scene),
        ("prefabs/tree.prefab", b"tree", AssetKind::Prefab),
    ];

    let mut assets = HashMap::new();
    for (key, data, kind) in files {
        let hash = content_hash(data);
        store.write(&hash, Bytes::from_static(data)).await?;
        let label = key.split('/').next().unwrap_or_default().to_string();
        assets.insert(
            key.to_string(),
            AssetInfo {
                hash,
                size: data.len() as u64,
                mime_type: None,
                kind,
                labels: vec![label],
            },
        );
    }

    store
        .write_catalog(&CatalogManifest {
            version: "v1".to_string(),
            published_at: chrono::Utc::now(),
            published_by: "local_bundles_example".to_string(),
            assets,
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let provider = LocalProvider::new(ROOT);
    write_bundle(provider.store()).await?;

    // No settings file: defaults, no preload.
    let (bundles, report) = bootstrap(provider, format!("{ROOT}/satchel.json")).await?;
    println!("Bootstrapped {} keys", report.asset_keys);

    let title = bundles.load_asset::<String>("ui/title.txt");
    title.wait().await;
    if let Some(title) = title.result() {
        println!("{title}");
    }

    let missing = bundles
        .load_asset::<String>("ui/missing.txt")
        .on_error(|e| println!("ui/missing.txt: {e}"));
    missing.wait().await;

    let forest = bundles.load_scene("levels/forest.scene", LoadSceneMode::Additive);
    forest.wait().await;
    if let Some(scene) = forest.result() {
        println!("Loaded {} in {} mode", scene.name, scene.mode);
    }

    let tree = bundles.instantiate("prefabs/tree.prefab", false);
    if tree.wait().await == HandleState::Succeeded {
        println!("Instantiated {:?}", tree.result());
    }

    tokio::fs::remove_dir_all(ROOT).await?;
    Ok(())
}
