use satchel_core::prelude::*;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::asset::{InstantiateHandler, LoadAssetHandler};
use crate::download::DownloadDependenciesHandler;
use crate::handle::HandleState;
use crate::lease::Lease;
use crate::scene::{LoadSceneHandler, UnloadSceneHandler};

#[derive(Error, Debug)]
pub enum BundlesError {
    #[error("Resource provider initialize error: {0}")]
    Initialize(#[source] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Append-only, deduplicated list of keys in insertion order.
#[derive(Debug, Default, Clone)]
pub struct KeyRegistry {
    keys: Vec<String>,
    seen: HashSet<String>,
}

impl KeyRegistry {
    /// Returns `false` when the key was already known.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.keys.push(key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

/// What [`Bundles::initialize`] did. Non-fatal failures are listed in
/// `errors` in addition to being logged.
#[derive(Debug, Clone, Default)]
pub struct InitializeReport {
    pub asset_keys: usize,
    pub updated_catalogs: Vec<String>,
    /// `Some(true)` when preload labels were downloaded, `Some(false)` when
    /// they were already present, `None` when no preload ran or it failed.
    pub preloaded: Option<bool>,
    pub errors: Vec<ErrorMessage>,
}

/// The asset bundle context: one provider, its settings, and the key
/// registries filled during initialization.
///
/// The registries are only written by [`initialize`](Self::initialize),
/// which takes `&mut self`; everything else reads them.
pub struct Bundles<P: ResourceProvider> {
    provider: P,
    settings: ProjectSettings,
    asset_keys: KeyRegistry,
    updated_catalogs: KeyRegistry,
    initialized: bool,
}

impl<P: ResourceProvider> Bundles<P> {
    pub fn new(provider: P, settings: ProjectSettings) -> Self {
        Self {
            provider,
            settings,
            asset_keys: KeyRegistry::default(),
            updated_catalogs: KeyRegistry::default(),
            initialized: false,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn asset_keys(&self) -> &KeyRegistry {
        &self.asset_keys
    }

    pub fn updated_catalogs(&self) -> &KeyRegistry {
        &self.updated_catalogs
    }

    /// Initializes the provider, applies pending catalog updates and, for
    /// remote bundles, downloads the preload labels.
    ///
    /// Only a provider that fails to initialize is an error. Catalog and
    /// preload failures are logged and reported, and initialization completes.
    pub async fn initialize(&mut self) -> Result<InitializeReport, BundlesError> {
        let keys = self.provider.initialize().await.map_err(|e| {
            error!("Resources initialize error: {e}");
            BundlesError::Initialize(e)
        })?;
        for key in keys {
            self.asset_keys.insert(key);
        }
        info!(
            "Resources initialized. {} asset keys arranged.",
            self.asset_keys.len()
        );

        let mut report = InitializeReport::default();
        self.check_catalog(&mut report).await;

        if self.settings.wants_preload() {
            let handle = self.download_dependencies(self.settings.preload_labels.clone());
            match handle.wait().await {
                HandleState::Succeeded => report.preloaded = handle.result().map(|r| *r),
                _ => report.errors.extend(handle.error()),
            }
        }

        report.asset_keys = self.asset_keys.len();
        self.initialized = true;
        Ok(report)
    }

    async fn check_catalog(&mut self, report: &mut InitializeReport) {
        info!("Check update catalogs");
        let catalogs = match self.provider.check_for_catalog_updates().await {
            Ok(catalogs) if !catalogs.is_empty() => catalogs,
            Ok(_) => {
                info!("No catalog update");
                return;
            }
            Err(e) => {
                warn!("Catalog check failed: {e}");
                report.errors.push(
                    ErrorMessage::builder(ErrorKind::CatalogCheckFailed)
                        .with_message("catalog", e.to_string())
                        .build(),
                );
                return;
            }
        };

        match self.provider.update_catalogs(&catalogs).await {
            Ok(keys) => {
                for key in keys {
                    self.updated_catalogs.insert(key);
                }
                report.updated_catalogs = catalogs;
                info!("Catalog update completed");
            }
            Err(e) => {
                warn!("Catalog update failed: {e}");
                report.errors.push(
                    ErrorMessage::builder(ErrorKind::CatalogUpdateFailed)
                        .with_message("catalog", e.to_string())
                        .build(),
                );
            }
        }
    }

    /// Bytes still to download for `labels`, without starting a download.
    pub async fn download_size<I, S>(&self, labels: I) -> Result<u64, ProviderError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let lease = Lease::acquire(&self.provider, OperationKind::DownloadSize, &labels.join(","));
        self.provider.download_size(lease.operation(), &labels).await
    }

    pub fn download_dependencies<I, S>(&self, labels: I) -> DownloadDependenciesHandler
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DownloadDependenciesHandler::builder(self.provider.clone())
            .with_labels(labels)
            .with_progress_interval(self.settings.progress_interval())
            .build()
    }

    pub fn load_scene(&self, asset_key: &str, mode: LoadSceneMode) -> LoadSceneHandler {
        LoadSceneHandler::builder(self.provider.clone())
            .with_asset_key(asset_key)
            .with_mode(mode)
            .with_progress_interval(self.settings.progress_interval())
            .build()
    }

    pub fn unload_scene(&self, scene: SceneInstance) -> UnloadSceneHandler {
        UnloadSceneHandler::builder(self.provider.clone())
            .with_scene(scene)
            .build()
    }

    pub fn load_asset<T: Asset>(&self, key: &str) -> LoadAssetHandler<T> {
        LoadAssetHandler::builder(self.provider.clone())
            .with_key(key)
            .build()
    }

    pub fn instantiate(&self, key: &str, logging: bool) -> InstantiateHandler {
        InstantiateHandler::builder(self.provider.clone())
            .with_key(key)
            .with_logging(logging)
            .build()
    }

    pub fn release_asset(&self, key: &str) {
        self.provider.release_asset(key);
    }
}
