use satchel_core::prelude::*;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::handle::{Completer, Handle, download_observers, handler_observers};
use crate::lease::Lease;
use crate::pipeline::{MIN_PROGRESS_INTERVAL, Polled, drive, finished, size_suffix};

/// Loads a scene by key, downloading its content first when needed.
pub struct LoadSceneHandler {
    handle: Handle<SceneInstance>,
}

handler_observers!(LoadSceneHandler => SceneInstance);
download_observers!(LoadSceneHandler);

impl LoadSceneHandler {
    pub fn builder<P: ResourceProvider>(provider: P) -> LoadSceneHandlerBuilder<P> {
        LoadSceneHandlerBuilder {
            provider,
            asset_key: String::new(),
            mode: LoadSceneMode::Single,
            progress_interval: ProjectSettings::default().progress_interval(),
        }
    }
}

pub struct LoadSceneHandlerBuilder<P> {
    provider: P,
    asset_key: String,
    mode: LoadSceneMode,
    progress_interval: Duration,
}

impl<P: ResourceProvider> LoadSceneHandlerBuilder<P> {
    pub fn with_asset_key(mut self, asset_key: impl Into<String>) -> Self {
        self.asset_key = asset_key.into();
        self
    }

    pub fn with_mode(mut self, mode: LoadSceneMode) -> Self {
        self.mode = mode;
        self
    }

    /// How often progress observers are sampled. Clamped to at least 1ms.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(MIN_PROGRESS_INTERVAL);
        self
    }

    pub fn build(self) -> LoadSceneHandler {
        let (handle, completer) = Handle::new(self.asset_key.clone());
        tokio::spawn(load_scene(
            self.provider,
            self.mode,
            self.progress_interval,
            completer,
        ));
        LoadSceneHandler { handle }
    }
}

async fn load_scene<P: ResourceProvider>(
    provider: P,
    mode: LoadSceneMode,
    progress_interval: Duration,
    mut completer: Completer<SceneInstance>,
) {
    let key = completer.key().to_string();
    completer.begin();
    if key.trim().is_empty() {
        warn!("Load scene requested without an asset key");
        return completer.fail(
            ErrorMessage::builder(ErrorKind::SceneLoadFailed)
                .with_message("error", "empty scene key")
                .build(),
        );
    }

    info!("Start load scene: {key} in {mode}");

    let size_lease = Lease::acquire(&provider, OperationKind::DownloadSize, &key);
    let labels = [key.clone()];
    let size = drive(
        &completer,
        None,
        provider.download_size(size_lease.operation(), &labels),
    )
    .await;
    completer.hold(size_lease);

    let size = match size {
        Polled::Done(Ok(size)) => size,
        Polled::Done(Err(e)) => {
            // The load itself reports whether the scene is reachable.
            warn!("Scene download size unknown for {key}: {e}");
            0
        }
        Polled::Canceled => return completer.cancelled(scene_canceled()),
    };
    if size > 0 {
        info!("Scene download start: {key} {}", size_suffix(size));
        completer.notify_before_download(size);
    }

    let lease = Lease::acquire(&provider, OperationKind::LoadScene, &key);
    let status = lease.operation().status().clone();
    let outcome = drive(
        &completer,
        Some((&status, progress_interval)),
        provider.load_scene(lease.operation(), &key, mode),
    )
    .await;
    completer.hold(lease);

    match outcome {
        Polled::Done(Ok(scene)) => {
            info!("Load scene success: {key}");
            completer.report_progress(finished(&status, size));
            completer.succeed(scene);
        }
        Polled::Done(Err(e)) => {
            error!("Load scene fail: {key} - {e}");
            completer.fail(
                ErrorMessage::builder(ErrorKind::SceneLoadFailed)
                    .with_message("error", e.to_string())
                    .build(),
            );
        }
        Polled::Canceled => {
            warn!("Load scene canceled: {key}");
            completer.cancelled(scene_canceled());
        }
    }
}

fn scene_canceled() -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::Canceled)
        .with_message("canceled", "scene load canceled")
        .build()
}

/// Unloads a scene previously produced by a [`LoadSceneHandler`].
pub struct UnloadSceneHandler {
    handle: Handle<()>,
}

handler_observers!(UnloadSceneHandler => ());

impl UnloadSceneHandler {
    pub fn builder<P: ResourceProvider>(provider: P) -> UnloadSceneHandlerBuilder<P> {
        UnloadSceneHandlerBuilder {
            provider,
            scene: None,
        }
    }
}

pub struct UnloadSceneHandlerBuilder<P> {
    provider: P,
    scene: Option<SceneInstance>,
}

impl<P: ResourceProvider> UnloadSceneHandlerBuilder<P> {
    pub fn with_scene(mut self, scene: SceneInstance) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn build(self) -> UnloadSceneHandler {
        let key = self.scene.as_ref().map(|s| s.key.clone()).unwrap_or_default();
        let (handle, completer) = Handle::new(key);
        tokio::spawn(unload_scene(self.provider, self.scene, completer));
        UnloadSceneHandler { handle }
    }
}

fn unload_failed(detail: impl Into<String>) -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::SceneUnloadFailed)
        .with_message("error", detail)
        .build()
}

async fn unload_scene<P: ResourceProvider>(
    provider: P,
    scene: Option<SceneInstance>,
    mut completer: Completer<()>,
) {
    completer.begin();
    let Some(scene) = scene else {
        error!("Unload scene requested without a scene");
        return completer.fail(unload_failed("no scene"));
    };

    info!("Start unload scene: {}", scene.name);

    let lease = Lease::acquire(&provider, OperationKind::UnloadScene, &scene.key);
    let outcome = drive(
        &completer,
        None,
        provider.unload_scene(lease.operation(), &scene),
    )
    .await;
    completer.hold(lease);

    match outcome {
        Polled::Done(Ok(())) => completer.succeed(()),
        Polled::Done(Err(e)) => {
            error!("Unload scene fail: {} - {e}", scene.name);
            completer.fail(unload_failed(e.to_string()));
        }
        Polled::Canceled => completer.cancelled(
            ErrorMessage::builder(ErrorKind::Canceled)
                .with_message("canceled", "scene unload canceled")
                .build(),
        ),
    }
}
