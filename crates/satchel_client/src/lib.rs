//! # Satchel Remote Bundles
//!
//! A [`ResourceProvider`] that reads its catalog from an HTTP asset server
//! (`GET {base}/manifest/{version}`) and fetches blobs on demand
//! (`GET {base}/assets/{hash}`).
//!
//! Downloaded blobs land in a [`BlobStore`] cache and are verified against
//! their SHA256 before they become visible, so sizes reported by
//! `download_size` only count what is not cached yet.
//!
//! ## Usage
//!
//! ```no_run
//! use satchel_client::RemoteProvider;
//!
//! let provider = RemoteProvider::new("http://localhost:3000", ".satchel-cache")
//!     .with_version("v1.0")
//!     .with_token(Some("secret".to_string()));
//! ```

use bytes::Bytes;
use futures::TryStreamExt;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use satchel_core::prelude::*;
use satchel_fs::{BlobStore, ByteStream};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server returned error {0}: {1}")]
    ServerError(StatusCode, String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<RemoteError> for ProviderError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Io(e) => ProviderError::Io(e),
            RemoteError::ServerError(StatusCode::NOT_FOUND, text) => ProviderError::NotFound(text),
            other => ProviderError::Generic(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Default)]
struct RemoteState {
    catalog: Option<CatalogManifest>,
    pending: Option<CatalogManifest>,
    assets: HashMap<String, Bytes>,
    scenes: Vec<SceneInstance>,
    next_id: u64,
}

impl RemoteState {
    fn catalog(&self) -> std::result::Result<&CatalogManifest, ProviderError> {
        self.catalog.as_ref().ok_or(ProviderError::NotInitialized)
    }

    fn lookup(&self, key: &str) -> std::result::Result<Option<AssetInfo>, ProviderError> {
        Ok(self.catalog()?.get(key).cloned())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone)]
pub struct RemoteProvider {
    base_url: String,
    client: Client,
    token: Option<String>,
    version: String,
    cache: BlobStore,
    state: Arc<Mutex<RemoteState>>,
}

impl RemoteProvider {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            token: None,
            version: "latest".to_string(),
            cache: BlobStore::new(cache_dir),
            state: Arc::default(),
        }
    }

    /// The catalog version to track. Defaults to `latest`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn cache(&self) -> &BlobStore {
        &self.cache
    }

    fn auth_request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            builder.header("Authorization", format!("Bearer {token}"))
        } else {
            builder
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.auth_request(self.client.get(url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RemoteError::ServerError(status, text));
        }

        Ok(response)
    }

    pub async fn fetch_manifest(&self, version: &str) -> Result<CatalogManifest> {
        let url = format!("{}/manifest/{version}", self.base_url);
        let response = self.get(&url).await?;

        let manifest: CatalogManifest = response
            .json()
            .await
            .map_err(|e| RemoteError::Validation(format!("Failed to parse manifest: {e}")))?;

        Ok(manifest)
    }

    async fn fetch_blob(&self, hash: &str) -> Result<ByteStream> {
        let url = format!("{}/assets/{hash}", self.base_url);
        let response = self.get(&url).await?;
        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }

    /// Streams `hash` into the cache unless it is already there, counting
    /// received bytes on `status`.
    async fn ensure_blob(
        &self,
        hash: &str,
        status: &DownloadStatus,
    ) -> std::result::Result<(), ProviderError> {
        if self.cache.contains(hash).await? {
            return Ok(());
        }
        debug!("Downloading blob {hash}");
        let stream = self.fetch_blob(hash).await?;
        self.cache
            .write_stream(hash, stream, |n| status.add_downloaded(n))
            .await?;
        Ok(())
    }

    async fn missing_blobs(
        &self,
        labels: &[String],
    ) -> std::result::Result<Vec<(String, u64)>, ProviderError> {
        let blobs = self.state.lock().catalog()?.blobs_for_labels(labels);
        let mut missing = Vec::new();
        for (hash, size) in blobs {
            if !self.cache.contains(&hash).await? {
                missing.push((hash, size));
            }
        }
        Ok(missing)
    }

    fn is_newer(loaded: &CatalogManifest, remote: &CatalogManifest) -> bool {
        remote.version != loaded.version || remote.published_at > loaded.published_at
    }
}

impl ResourceProvider for RemoteProvider {
    async fn initialize(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let catalog = match self.fetch_manifest(&self.version).await {
            Ok(catalog) => {
                self.cache.write_catalog(&catalog).await?;
                catalog
            }
            Err(e) => {
                warn!("Catalog fetch failed, trying cached catalog: {e}");
                self.cache
                    .read_catalog()
                    .await
                    .map_err(|_| ProviderError::from(e))?
            }
        };
        info!(
            "Catalog {} ({} assets) from {}",
            catalog.version,
            catalog.assets.len(),
            self.base_url
        );
        let keys = catalog.keys().map(str::to_string).collect();
        self.state.lock().catalog = Some(catalog);
        Ok(keys)
    }

    async fn check_for_catalog_updates(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let remote = self.fetch_manifest(&self.version).await?;
        let mut state = self.state.lock();
        if !Self::is_newer(state.catalog()?, &remote) {
            return Ok(Vec::new());
        }
        let version = remote.version.clone();
        state.pending = Some(remote);
        Ok(vec![version])
    }

    async fn update_catalogs(
        &self,
        catalogs: &[String],
    ) -> std::result::Result<Vec<String>, ProviderError> {
        let pending = self.state.lock().pending.take();
        let catalog = match pending {
            Some(catalog) if catalogs.contains(&catalog.version) => catalog,
            _ => self.fetch_manifest(&self.version).await?,
        };
        self.cache.write_catalog(&catalog).await?;

        let keys = catalog.keys().map(str::to_string).collect();
        let mut state = self.state.lock();
        state.catalog = Some(catalog);
        state.assets.clear();
        Ok(keys)
    }

    async fn download_size(
        &self,
        _op: &OperationHandle,
        labels: &[String],
    ) -> std::result::Result<u64, ProviderError> {
        let missing = self.missing_blobs(labels).await?;
        Ok(missing.iter().map(|(_, size)| size).sum())
    }

    async fn download_dependencies(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> std::result::Result<(), ProviderError> {
        let missing = self.missing_blobs(labels).await?;
        op.status()
            .set_total(missing.iter().map(|(_, size)| size).sum());
        for (hash, _) in &missing {
            self.ensure_blob(hash, op.status()).await?;
        }
        op.status().mark_done();
        Ok(())
    }

    async fn load_scene(
        &self,
        op: &OperationHandle,
        key: &str,
        mode: LoadSceneMode,
    ) -> std::result::Result<SceneInstance, ProviderError> {
        let info = match self.state.lock().lookup(key)? {
            Some(info) if info.kind == AssetKind::Scene => info,
            _ => return Err(ProviderError::NotFound(key.to_string())),
        };
        if !self.cache.contains(&info.hash).await? {
            op.status().set_total(info.size);
            self.ensure_blob(&info.hash, op.status()).await?;
        }
        op.status().mark_done();

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
    ) -> std::result::Result<(), ProviderError> {
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
        op: &OperationHandle,
        key: &str,
    ) -> std::result::Result<Option<Bytes>, ProviderError> {
        let info = {
            let state = self.state.lock();
            if let Some(data) = state.assets.get(key) {
                return Ok(Some(data.clone()));
            }
            match state.lookup(key)? {
                Some(info) => info,
                None => return Ok(None),
            }
        };
        self.ensure_blob(&info.hash, op.status()).await?;
        let data = self.cache.read_verified(key, &info.hash).await?;
        self.state.lock().assets.insert(key.to_string(), data.clone());
        Ok(Some(data))
    }

    async fn instantiate(
        &self,
        _op: &OperationHandle,
        key: &str,
    ) -> std::result::Result<Option<Instance>, ProviderError> {
        let mut state = self.state.lock();
        match state.lookup(key)? {
            Some(info) if info.kind == AssetKind::Prefab => Ok(Some(Instance {
                id: state.next_id(),
                key: key.to_string(),
                name: name_from_key(key),
            })),
            _ => Ok(None),
        }
    }

    fn release(&self, op: &OperationHandle) {
        debug!("Release {} ({:?} {})", op.id(), op.kind(), op.key());
    }

    fn release_asset(&self, key: &str) {
        self.state.lock().assets.remove(key);
    }
}
