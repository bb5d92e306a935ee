use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The catalog is the source of truth for a content version.
/// It maps asset keys ("scenes/forest.scene") to content hashes and labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// The Version ID e.g., "v1.0" or a Git SHA "a8f3b".
    pub version: String,

    /// Standard UTC timestamp.
    pub published_at: DateTime<Utc>,

    /// Who built the catalog.
    pub published_by: String,

    /// - Key: asset key e.g., "textures/grass.png"
    /// - Value: Metadata
    pub assets: HashMap<String, AssetInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// The SHA256 hash. This is the filename in the blob storage.
    pub hash: String,

    /// Size in bytes
    pub size: u64,

    /// Optional: Media Type
    pub mime_type: Option<String>,

    #[serde(default)]
    pub kind: AssetKind,

    /// Groups this asset belongs to for batched downloads.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    #[default]
    Asset,
    Scene,
    Prefab,
}

impl CatalogManifest {
    pub fn get(&self, key: &str) -> Option<&AssetInfo> {
        self.assets.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    /// Every asset carrying at least one of `labels`.
    /// A label may also name an asset key directly.
    pub fn resolve_labels<'a>(
        &'a self,
        labels: &'a [String],
    ) -> impl Iterator<Item = (&'a str, &'a AssetInfo)> + 'a {
        self.assets.iter().filter_map(move |(key, info)| {
            let hit = labels
                .iter()
                .any(|label| label == key || info.labels.contains(label));
            hit.then_some((key.as_str(), info))
        })
    }

    /// Unique blobs referenced by `labels`, as `(hash, size)` pairs.
    pub fn blobs_for_labels(&self, labels: &[String]) -> Vec<(String, u64)> {
        let mut blobs: Vec<(String, u64)> = Vec::new();
        for (_, info) in self.resolve_labels(labels) {
            if !blobs.iter().any(|(hash, _)| hash == &info.hash) {
                blobs.push((info.hash.clone(), info.size));
            }
        }
        blobs.sort();
        blobs
    }
}
