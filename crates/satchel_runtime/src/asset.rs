use satchel_core::prelude::*;
use std::marker::PhantomData;
use tracing::{info, warn};

use crate::handle::{Completer, Handle, handler_observers};
use crate::lease::Lease;
use crate::pipeline::{Polled, drive};

fn load_canceled() -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::Canceled)
        .with_message("canceled", "asset load canceled")
        .build()
}

/// Loads one asset and decodes it as `T`.
pub struct LoadAssetHandler<T: Asset> {
    handle: Handle<T>,
}

handler_observers!(LoadAssetHandler<T> => T, T: Asset);

impl<T: Asset> LoadAssetHandler<T> {
    pub fn builder<P: ResourceProvider>(provider: P) -> LoadAssetHandlerBuilder<P, T> {
        LoadAssetHandlerBuilder {
            provider,
            key: String::new(),
            _asset: PhantomData,
        }
    }
}

pub struct LoadAssetHandlerBuilder<P, T> {
    provider: P,
    key: String,
    _asset: PhantomData<fn() -> T>,
}

impl<P: ResourceProvider, T: Asset> LoadAssetHandlerBuilder<P, T> {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn build(self) -> LoadAssetHandler<T> {
        let (handle, completer) = Handle::new(self.key);
        tokio::spawn(load_asset(self.provider, completer));
        LoadAssetHandler { handle }
    }
}

/// Loads `key` and decodes it. Missing keys, provider failures and payloads
/// that do not decode as `T` all read as "asset not found".
async fn fetch<P, T, R>(provider: &P, completer: &mut Completer<R>) -> Polled<Option<T>>
where
    P: ResourceProvider,
    T: Asset,
    R: Send + Sync + 'static,
{
    let key = completer.key().to_string();
    let lease = Lease::acquire(provider, OperationKind::LoadAsset, &key);
    let outcome = drive(completer, None, provider.load_asset(lease.operation(), &key)).await;
    completer.hold(lease);

    let data = match outcome {
        Polled::Done(Ok(Some(data))) => data,
        Polled::Done(Ok(None)) => return Polled::Done(None),
        Polled::Done(Err(e)) => {
            warn!("Asset load failed: {key} - {e}");
            return Polled::Done(None);
        }
        Polled::Canceled => return Polled::Canceled,
    };

    match T::decode(&key, data) {
        Ok(asset) => Polled::Done(Some(asset)),
        Err(e) => {
            warn!("Asset decode failed: {key} - {e}");
            Polled::Done(None)
        }
    }
}

async fn load_asset<P: ResourceProvider, T: Asset>(provider: P, mut completer: Completer<T>) {
    completer.begin();
    match fetch::<P, T, T>(&provider, &mut completer).await {
        Polled::Done(Some(asset)) => completer.succeed(asset),
        Polled::Done(None) => {
            warn!("Asset not found: {}", completer.key());
            completer.fail(ErrorMessage::asset_not_found());
        }
        Polled::Canceled => completer.cancelled(load_canceled()),
    }
}

/// Verifies a prefab exists, then instantiates it.
pub struct InstantiateHandler {
    handle: Handle<Instance>,
}

handler_observers!(InstantiateHandler => Instance);

impl InstantiateHandler {
    pub fn builder<P: ResourceProvider>(provider: P) -> InstantiateHandlerBuilder<P> {
        InstantiateHandlerBuilder {
            provider,
            key: String::new(),
            logging: false,
        }
    }
}

pub struct InstantiateHandlerBuilder<P> {
    provider: P,
    key: String,
    logging: bool,
}

impl<P: ResourceProvider> InstantiateHandlerBuilder<P> {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Logs the start and the created instance at info level.
    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn build(self) -> InstantiateHandler {
        let (handle, completer) = Handle::new(self.key);
        tokio::spawn(instantiate(self.provider, self.logging, completer));
        InstantiateHandler { handle }
    }
}

async fn instantiate<P: ResourceProvider>(
    provider: P,
    logging: bool,
    mut completer: Completer<Instance>,
) {
    let key = completer.key().to_string();
    if logging {
        info!("Start instantiate asset: {key}");
    }
    completer.begin();

    let checked = fetch::<P, bytes::Bytes, Instance>(&provider, &mut completer).await;
    // The payload was only loaded to prove the key exists.
    if matches!(checked, Polled::Done(_)) {
        provider.release_asset(&key);
    }
    match checked {
        Polled::Done(Some(_)) => {}
        Polled::Done(None) => {
            warn!("Asset not found: {key}");
            return completer.fail(ErrorMessage::asset_not_found());
        }
        Polled::Canceled => return completer.cancelled(load_canceled()),
    }

    let lease = Lease::acquire(&provider, OperationKind::Instantiate, &key);
    let outcome = drive(&completer, None, provider.instantiate(lease.operation(), &key)).await;
    completer.hold(lease);

    match outcome {
        Polled::Done(Ok(Some(instance))) => {
            if logging {
                info!("Instantiate asset success: {key} {}", instance.name);
            }
            completer.succeed(instance);
        }
        Polled::Done(Ok(None)) => {
            warn!("Instantiate asset fail: {key}");
            completer.fail(instantiate_failed("instantiate failed"));
        }
        Polled::Done(Err(e)) => {
            warn!("Instantiate asset fail: {key} - {e}");
            completer.fail(instantiate_failed(e.to_string()));
        }
        Polled::Canceled => completer.cancelled(
            ErrorMessage::builder(ErrorKind::Canceled)
                .with_message("canceled", "instantiate canceled")
                .build(),
        ),
    }
}

fn instantiate_failed(detail: impl Into<String>) -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::InstantiateFailed)
        .with_message("error", detail)
        .build()
}
