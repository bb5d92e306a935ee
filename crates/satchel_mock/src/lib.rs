//! In-memory [`ResourceProvider`] for tests and examples.
//!
//! Content, latencies and failures are scripted up front; every operation
//! the runtime opens and every release it performs is recorded so tests can
//! assert that each operation was released exactly once.

use bytes::Bytes;
use parking_lot::Mutex;
use satchel_core::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    Initialize,
    CatalogCheck,
    CatalogUpdate,
    DownloadSize,
    Download,
    LoadScene,
    UnloadScene,
    LoadAsset,
    Instantiate,
}

#[derive(Debug, Clone)]
struct MockAsset {
    data: Bytes,
    kind: AssetKind,
    labels: Vec<String>,
    download_size: u64,
    downloaded: bool,
}

#[derive(Debug, Default)]
struct MockState {
    assets: BTreeMap<String, MockAsset>,
    catalog_updates: Vec<String>,
    catalog_update_keys: Vec<String>,
    failures: HashSet<MockFailure>,
    latency: Duration,
    chunks: u32,
    next_id: u64,
    loaded_scenes: Vec<SceneInstance>,
    operations: Vec<(OperationId, OperationKind)>,
    releases: HashMap<OperationId, usize>,
    released_assets: Vec<String>,
}

impl MockState {
    /// Assets matched by `labels` (label or key) that still need downloading.
    fn pending(&self, labels: &[String]) -> Vec<(String, u64)> {
        self.assets
            .iter()
            .filter(|(key, asset)| {
                labels
                    .iter()
                    .any(|label| label == *key || asset.labels.contains(label))
            })
            .filter(|(_, asset)| !asset.downloaded && asset.download_size > 0)
            .map(|(key, asset)| (key.clone(), asset.download_size))
            .collect()
    }

    fn fails(&self, failure: MockFailure) -> Result<(), ProviderError> {
        if self.failures.contains(&failure) {
            Err(ProviderError::Generic(format!("scripted {failure:?} failure")))
        } else {
            Ok(())
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(self, key: &str, asset: MockAsset) -> Self {
        self.state.lock().assets.insert(key.to_string(), asset);
        self
    }

    /// A locally available asset.
    pub fn with_asset(self, key: &str, data: impl Into<Bytes>) -> Self {
        self.insert(
            key,
            MockAsset {
                data: data.into(),
                kind: AssetKind::Asset,
                labels: Vec::new(),
                download_size: 0,
                downloaded: true,
            },
        )
    }

    /// An asset that needs `download_size` bytes fetched before it is local.
    pub fn with_remote_asset(
        self,
        key: &str,
        data: impl Into<Bytes>,
        labels: &[&str],
        download_size: u64,
    ) -> Self {
        self.insert(
            key,
            MockAsset {
                data: data.into(),
                kind: AssetKind::Asset,
                labels: labels.iter().map(|l| l.to_string()).collect(),
                download_size,
                downloaded: download_size == 0,
            },
        )
    }

    pub fn with_scene(self, key: &str, download_size: u64) -> Self {
        self.insert(
            key,
            MockAsset {
                data: Bytes::new(),
                kind: AssetKind::Scene,
                labels: Vec::new(),
                download_size,
                downloaded: download_size == 0,
            },
        )
    }

    pub fn with_prefab(self, key: &str) -> Self {
        self.insert(
            key,
            MockAsset {
                data: Bytes::from_static(b"prefab"),
                kind: AssetKind::Prefab,
                labels: Vec::new(),
                download_size: 0,
                downloaded: true,
            },
        )
    }

    /// `check_for_catalog_updates` reports `catalog`; applying it yields `keys`.
    pub fn with_catalog_update(self, catalog: &str, keys: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            state.catalog_updates.push(catalog.to_string());
            state
                .catalog_update_keys
                .extend(keys.iter().map(|k| k.to_string()));
        }
        self
    }

    /// Delay before each operation answers, and between download chunks.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = latency;
        self
    }

    pub fn with_download_chunks(self, chunks: u32) -> Self {
        self.state.lock().chunks = chunks;
        self
    }

    pub fn failing(self, failure: MockFailure) -> Self {
        self.state.lock().failures.insert(failure);
        self
    }

    /// Every operation a provider call was made with, in call order.
    pub fn operations(&self) -> Vec<(OperationId, OperationKind)> {
        self.state.lock().operations.clone()
    }

    pub fn operations_of(&self, kind: OperationKind) -> Vec<OperationId> {
        self.operations()
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn release_count(&self, id: OperationId) -> usize {
        self.state.lock().releases.get(&id).copied().unwrap_or(0)
    }

    /// True when every recorded operation was released exactly once and
    /// nothing unknown was released.
    pub fn all_released_once(&self) -> bool {
        let state = self.state.lock();
        let seen: HashSet<OperationId> = state.operations.iter().map(|(id, _)| *id).collect();
        seen.iter().all(|id| state.releases.get(id) == Some(&1))
            && state.releases.keys().all(|id| seen.contains(id))
    }

    pub fn loaded_scenes(&self) -> Vec<SceneInstance> {
        self.state.lock().loaded_scenes.clone()
    }

    pub fn released_assets(&self) -> Vec<String> {
        self.state.lock().released_assets.clone()
    }

    pub fn is_downloaded(&self, key: &str) -> bool {
        self.state
            .lock()
            .assets
            .get(key)
            .is_some_and(|asset| asset.downloaded)
    }

    fn record(&self, op: &OperationHandle) {
        self.state.lock().operations.push((op.id(), op.kind()));
    }

    fn latency(&self) -> Duration {
        self.state.lock().latency
    }

    async fn delay(&self) {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Feeds `pending` through the operation's byte counters chunk by chunk.
    async fn transfer(
        &self,
        op: &OperationHandle,
        pending: &[(String, u64)],
    ) -> Result<(), ProviderError> {
        let (chunks, latency, fail) = {
            let state = self.state.lock();
            (
                u64::from(state.chunks.max(1)),
                state.latency,
                state.failures.contains(&MockFailure::Download),
            )
        };
        let total: u64 = pending.iter().map(|(_, size)| size).sum();
        op.status().set_total(total);

        let step = total / chunks;
        for chunk in 0..chunks {
            tokio::time::sleep(latency).await;
            if fail && chunk == chunks / 2 {
                return Err(ProviderError::Generic("scripted Download failure".into()));
            }
            let bytes = if chunk == chunks - 1 {
                total - step * (chunks - 1)
            } else {
                step
            };
            op.status().add_downloaded(bytes);
        }

        let mut state = self.state.lock();
        for (key, _) in pending {
            if let Some(asset) = state.assets.get_mut(key) {
                asset.downloaded = true;
            }
        }
        op.status().mark_done();
        Ok(())
    }
}

impl ResourceProvider for MockProvider {
    async fn initialize(&self) -> Result<Vec<String>, ProviderError> {
        self.delay().await;
        let state = self.state.lock();
        state.fails(MockFailure::Initialize)?;
        Ok(state.assets.keys().cloned().collect())
    }

    async fn check_for_catalog_updates(&self) -> Result<Vec<String>, ProviderError> {
        self.delay().await;
        let state = self.state.lock();
        state.fails(MockFailure::CatalogCheck)?;
        Ok(state.catalog_updates.clone())
    }

    async fn update_catalogs(&self, _catalogs: &[String]) -> Result<Vec<String>, ProviderError> {
        self.delay().await;
        let state = self.state.lock();
        state.fails(MockFailure::CatalogUpdate)?;
        Ok(state.catalog_update_keys.clone())
    }

    async fn download_size(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> Result<u64, ProviderError> {
        self.record(op);
        self.delay().await;
        let state = self.state.lock();
        state.fails(MockFailure::DownloadSize)?;
        Ok(state.pending(labels).iter().map(|(_, size)| size).sum())
    }

    async fn download_dependencies(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> Result<(), ProviderError> {
        self.record(op);
        let pending = self.state.lock().pending(labels);
        self.transfer(op, &pending).await
    }

    async fn load_scene(
        &self,
        op: &OperationHandle,
        key: &str,
        mode: LoadSceneMode,
    ) -> Result<SceneInstance, ProviderError> {
        self.record(op);
        self.delay().await;
        let pending = {
            let state = self.state.lock();
            state.fails(MockFailure::LoadScene)?;
            match state.assets.get(key) {
                Some(asset) if asset.kind == AssetKind::Scene => state.pending(&[key.to_string()]),
                _ => return Err(ProviderError::NotFound(key.to_string())),
            }
        };
        if !pending.is_empty() {
            self.transfer(op, &pending).await?;
        }

        let mut state = self.state.lock();
        let scene = SceneInstance {
            id: state.next_id(),
            key: key.to_string(),
            name: name_from_key(key),
            mode,
        };
        if mode == LoadSceneMode::Single {
            state.loaded_scenes.clear();
        }
        state.loaded_scenes.push(scene.clone());
        Ok(scene)
    }

    async fn unload_scene(
        &self,
        op: &OperationHandle,
        scene: &SceneInstance,
    ) -> Result<(), ProviderError> {
        self.record(op);
        self.delay().await;
        let mut state = self.state.lock();
        state.fails(MockFailure::UnloadScene)?;
        let before = state.loaded_scenes.len();
        state.loaded_scenes.retain(|loaded| loaded.id != scene.id);
        if state.loaded_scenes.len() == before {
            return Err(ProviderError::NotFound(format!("scene {} not loaded", scene.key)));
        }
        Ok(())
    }

    async fn load_asset(
        &self,
        op: &OperationHandle,
        key: &str,
    ) -> Result<Option<Bytes>, ProviderError> {
        self.record(op);
        self.delay().await;
        let state = self.state.lock();
        state.fails(MockFailure::LoadAsset)?;
        Ok(state.assets.get(key).map(|asset| asset.data.clone()))
    }

    async fn instantiate(
        &self,
        op: &OperationHandle,
        key: &str,
    ) -> Result<Option<Instance>, ProviderError> {
        self.record(op);
        self.delay().await;
        let mut state = self.state.lock();
        state.fails(MockFailure::Instantiate)?;
        let is_prefab = state
            .assets
            .get(key)
            .is_some_and(|asset| asset.kind == AssetKind::Prefab);
        if !is_prefab {
            return Ok(None);
        }
        Ok(Some(Instance {
            id: state.next_id(),
            key: key.to_string(),
            name: name_from_key(key),
        }))
    }

    fn release(&self, op: &OperationHandle) {
        *self.state.lock().releases.entry(op.id()).or_default() += 1;
    }

    fn release_asset(&self, key: &str) {
        self.state.lock().released_assets.push(key.to_string());
    }
}
