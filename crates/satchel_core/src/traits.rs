use crate::error::*;
use crate::operation::OperationHandle;
use crate::scene::{Instance, LoadSceneMode, SceneInstance};

use bytes::Bytes;

/// The asset subsystem the runtime drives.
///
/// Every asynchronous call receives the [`OperationHandle`] that tracks it.
/// Download-style calls report byte counts through
/// [`OperationHandle::status`]. The runtime returns each handle through
/// [`release`](Self::release) exactly once.
pub trait ResourceProvider: Send + Sync + 'static + Clone {
    /// Loads the catalog and returns every key it resolves.
    fn initialize(&self) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;

    /// Ids of catalogs that have a newer version than the loaded one.
    fn check_for_catalog_updates(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;

    /// Applies catalog updates and returns the keys of the updated catalogs.
    fn update_catalogs(
        &self,
        catalogs: &[String],
    ) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;

    /// Bytes still to fetch before everything in `labels` is available locally.
    fn download_size(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> impl Future<Output = Result<u64, ProviderError>> + Send;

    fn download_dependencies(
        &self,
        op: &OperationHandle,
        labels: &[String],
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn load_scene(
        &self,
        op: &OperationHandle,
        key: &str,
        mode: LoadSceneMode,
    ) -> impl Future<Output = Result<SceneInstance, ProviderError>> + Send;

    fn unload_scene(
        &self,
        op: &OperationHandle,
        scene: &SceneInstance,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// `Ok(None)` when the key resolves to nothing.
    fn load_asset(
        &self,
        op: &OperationHandle,
        key: &str,
    ) -> impl Future<Output = Result<Option<Bytes>, ProviderError>> + Send;

    /// `Ok(None)` when the asset could not be turned into an instance.
    fn instantiate(
        &self,
        op: &OperationHandle,
        key: &str,
    ) -> impl Future<Output = Result<Option<Instance>, ProviderError>> + Send;

    /// Frees whatever the provider tracks for `op`. Scenes and instances
    /// produced by the operation stay alive until unloaded or released.
    fn release(&self, op: &OperationHandle);

    /// Optional: Drops a cached asset payload.
    fn release_asset(&self, _key: &str) {}
}
