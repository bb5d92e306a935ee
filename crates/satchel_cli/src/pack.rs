use bytes::Bytes;
use chrono::Utc;
use satchel_core::manifest::{AssetInfo, AssetKind, CatalogManifest};
use satchel_fs::{BlobStore, content_hash};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

fn kind_of(path: &Path) -> AssetKind {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("scene") => AssetKind::Scene,
        Some("prefab") => AssetKind::Prefab,
        _ => AssetKind::Asset,
    }
}

/// The top-level folder labels everything below it.
fn labels_of(relative_path: &str) -> Vec<String> {
    match relative_path.split_once('/') {
        Some((folder, _)) => vec![folder.to_string()],
        None => Vec::new(),
    }
}

/// Copies every file under `dir` into a bundle directory at `out` and
/// writes its catalog.
pub async fn pack(
    dir: &Path,
    out: &Path,
    version: &str,
    published_by: String,
) -> anyhow::Result<CatalogManifest> {
    let store = BlobStore::new(out);
    let mut assets = HashMap::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_dir() || path.starts_with(out) {
            continue;
        }

        let relative_path = path
            .strip_prefix(dir)?
            .to_string_lossy()
            .replace('\\', "/");

        let data = tokio::fs::read(path).await?;
        let hash = content_hash(&data);
        let size = data.len() as u64;
        store.write(&hash, Bytes::from(data)).await?;

        let mime_type = Some(
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string(),
        );

        assets.insert(
            relative_path.clone(),
            AssetInfo {
                hash,
                size,
                mime_type,
                kind: kind_of(path),
                labels: labels_of(&relative_path),
            },
        );
    }

    let catalog = CatalogManifest {
        version: version.to_string(),
        published_at: Utc::now(),
        published_by,
        assets,
    };
    store.write_catalog(&catalog).await?;

    Ok(catalog)
}
