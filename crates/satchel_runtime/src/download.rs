use satchel_core::prelude::*;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::handle::{Completer, Handle, download_observers, handler_observers};
use crate::lease::Lease;
use crate::pipeline::{MIN_PROGRESS_INTERVAL, Polled, drive, finished, size_suffix};

/// Pre-downloads everything referenced by a label set.
///
/// Succeeds with `true` when something was downloaded and `false` when the
/// content was already available.
pub struct DownloadDependenciesHandler {
    handle: Handle<bool>,
}

handler_observers!(DownloadDependenciesHandler => bool);
download_observers!(DownloadDependenciesHandler);

impl DownloadDependenciesHandler {
    pub fn builder<P: ResourceProvider>(provider: P) -> DownloadDependenciesHandlerBuilder<P> {
        DownloadDependenciesHandlerBuilder {
            provider,
            labels: Vec::new(),
            progress_interval: ProjectSettings::default().progress_interval(),
        }
    }
}

pub struct DownloadDependenciesHandlerBuilder<P> {
    provider: P,
    labels: Vec<String>,
    progress_interval: Duration,
}

impl<P: ResourceProvider> DownloadDependenciesHandlerBuilder<P> {
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// How often progress observers are sampled. Clamped to at least 1ms.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(MIN_PROGRESS_INTERVAL);
        self
    }

    /// Starts the download on the current tokio runtime.
    pub fn build(self) -> DownloadDependenciesHandler {
        let (handle, completer) = Handle::new(self.labels.join(","));
        tokio::spawn(download_dependencies(
            self.provider,
            self.labels,
            self.progress_interval,
            completer,
        ));
        DownloadDependenciesHandler { handle }
    }
}

fn download_failed() -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::DownloadFailed)
        .with_message("dependence", "download failed")
        .build()
}

fn download_canceled() -> ErrorMessage {
    ErrorMessage::builder(ErrorKind::DownloadCanceled)
        .with_message("dependence", "download canceled")
        .build()
}

async fn download_dependencies<P: ResourceProvider>(
    provider: P,
    labels: Vec<String>,
    progress_interval: Duration,
    mut completer: Completer<bool>,
) {
    info!("Start download dependencies: [{}]", completer.key());
    completer.begin();

    let size_lease = Lease::acquire(&provider, OperationKind::DownloadSize, completer.key());
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
            error!("Dependencies download size check failed: {e}");
            return completer.fail(download_failed());
        }
        Polled::Canceled => {
            warn!("Dependencies download canceled: [{}]", completer.key());
            return completer.cancelled(download_canceled());
        }
    };

    if size == 0 {
        info!("No dependencies to download");
        return completer.succeed(false);
    }

    info!("Dependencies download start: {}", size_suffix(size));
    completer.notify_before_download(size);

    let lease = Lease::acquire(&provider, OperationKind::Download, completer.key());
    let status = lease.operation().status().clone();
    let outcome = drive(
        &completer,
        Some((&status, progress_interval)),
        provider.download_dependencies(lease.operation(), &labels),
    )
    .await;
    completer.hold(lease);

    match outcome {
        Polled::Done(Ok(())) => {
            info!("Dependencies download completed");
            completer.report_progress(finished(&status, size));
            completer.succeed(true);
        }
        Polled::Done(Err(e)) => {
            error!("Dependencies download failed: {e}");
            completer.fail(download_failed());
        }
        Polled::Canceled => {
            warn!("Dependencies download canceled: [{}]", completer.key());
            completer.cancelled(download_canceled());
        }
    }
}
