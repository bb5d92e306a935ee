use bytes::Bytes;
use parking_lot::Mutex;
use satchel_core::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::BlobStore;

#[derive(Default)]
struct LocalState {
    catalog: Option<CatalogManifest>,
    cache: HashMap<String, Bytes>,
    scenes: Vec<SceneInstance>,
    next_id: u64,
}

impl LocalState {
    fn catalog(&self) -> Result<&CatalogManifest, ProviderError> {
        self.catalog.as_ref().ok_or(ProviderError::NotInitialized)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Serves a bundle directory written by `satchel pack`.
///
/// Everything is already local, so download sizes are always zero and
/// downloading only checks that the referenced blobs are present.
#[derive(Clone)]
pub struct LocalProvider {
    store: BlobStore,
    state: Arc<Mutex<LocalState>>,
}

impl LocalProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: BlobStore::new(root),
            state: Arc::default(),
        }
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn loaded_scenes(&self) -> Vec<SceneInstance> {
        self.state.lock().scenes.clone()
    }

    fn lookup(&self, key: &str) -> Result<Option<AssetInfo>, ProviderError> {
        Ok(self.state.lock().catalog()?.get(key).cloned())
    }

    async fn require_blob(&self, key: &str, hash: &str) -> Result<(), ProviderError> {
        if self.store.contains(hash).await? {
            Ok(())
        } else {
            Err(ProviderError::NotFound(format!("blob {hash} for {key}")))
        }
    }
}

impl ResourceProvider for LocalProvider {
    async fn initialize(&self) -> Result<Vec<String>, ProviderError> {
        let catalog = self.store.read_catalog().await?;
        let keys: Vec<String> = catalog.keys().map(str::to_string).collect();
        info!(
            "Loaded catalog {} from {}",
            catalog.version,
            self.store.root().display()
        );
        self.state.lock().catalog = Some(catalog);
        Ok(keys)
    }

    async fn check_for_catalog_updates(&self) -> Result<Vec<String>, ProviderError> {
        let on_disk = self.store.read_catalog().await?;
        let state = self.state.lock();
        let loaded = state.catalog()?;
        if on_disk.version != loaded.version || on_disk.published_at != loaded.published_at {
            Ok(vec![on_disk.version])
        } else {
            Ok(Vec::new())
        }
    }

    async fn update_catalogs(&self, catalogs: &[String]) -> Result<Vec<String>, ProviderError> {
        let catalog = self.store.read_catalog().await?;
        if !catalogs.contains(&catalog.version) {
            return Err(ProviderError::NotFound(format!(
                "catalog {} is not among {catalogs:?}",
                catalog.version
            )));
        }
        let keys: Vec<String> = catalog.keys().map(str::to_string).collect();
        let mut state = self.state.lock();
        state.catalog = Some(catalog);
        state.cache.clear();
        Ok(keys)
    }

    async fn download_size(
        &self,
        _op: &OperationHandle,
        _labels: &[String],
    ) -> Result<u64, ProviderError> {
        Ok(0)
    }

    async fn download_dependencies(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> Result<(), ProviderError> {
        let blobs = self.state.lock().catalog()?.blobs_for_labels(labels);
        for (hash, _) in &blobs {
            self.require_blob(op.key(), hash).await?;
        }
        op.status().set_total(0);
        op.status().mark_done();
        Ok(())
    }

    async fn load_scene(
        &self,
        _op: &OperationHandle,
        key: &str,
        mode: LoadSceneMode,
    ) -> Result<SceneInstance, ProviderError> {
        let info = match self.lookup(key)? {
            Some(info) if info.kind == AssetKind::Scene => info,
            _ => return Err(ProviderError::NotFound(key.to_string())),
        };
        self.require_blob(key, &info.hash).await?;

        let mut state = self.state.lock();
        let scene = SceneInstance {
            id: state.next_id(),
            key: key.to_string(),
            name: name_from_key(key),
            mode,
        };
        if mode == LoadSceneMode::Single {
            state.scenes.clear();
        }
        state.scenes.push(scene.clone());
        Ok(scene)
    }

    async fn unload_scene(
        &self,
        _op: &OperationHandle,
        scene: &SceneInstance,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        let before = state.scenes.len();
        state.scenes.retain(|loaded| loaded.id != scene.id);
        if state.scenes.len() == before {
            return Err(ProviderError::NotFound(format!(
                "scene {} is not loaded",
                scene.key
            )));
        }
        Ok(())
    }

    async fn load_asset(
        &self,
        _op: &OperationHandle,
        key: &str,
    ) -> Result<Option<Bytes>, ProviderError> {
        if let Some(data) = self.state.lock().cache.get(key) {
            return Ok(Some(data.clone()));
        }
        let Some(info) = self.lookup(key)? else {
            return Ok(None);
        };
        let data = self.store.read_verified(key, &info.hash).await?;
        self.state.lock().cache.insert(key.to_string(), data.clone());
        Ok(Some(data))
    }

    async fn instantiate(
        &self,
        _op: &OperationHandle,
        key: &str,
    ) -> Result<Option<Instance>, ProviderError> {
        match self.lookup(key)? {
            Some(info) if info.kind == AssetKind::Prefab => {
                let mut state = self.state.lock();
                Ok(Some(Instance {
                    id: state.next_id(),
                    key: key.to_string(),
                    name: name_from_key(key),
                }))
            }
            _ => Ok(None),
        }
    }

    fn release(&self, op: &OperationHandle) {
        debug!("Release {} ({:?} {})", op.id(), op.kind(), op.key());
    }

    fn release_asset(&self, key: &str) {
        self.state.lock().cache.remove(key);
    }
}
