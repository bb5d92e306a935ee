//! The promise-style handle shared by every request kind.
//!
//! A [`Handle`] is the consumer side; the task driving the request owns the
//! matching [`Completer`]. Observers are delivered in the order
//! progress* -> success | error -> final, after which the completer's
//! leases are released and [`Handle::wait`] resolves.
//!
//! Success, error and final observers attached after the outcome is known
//! are replayed immediately, still in that order. Progress and
//! before-download observers only see events raised after they were added.

use parking_lot::Mutex;
use satchel_core::prelude::*;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::lease::Lease;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Created,
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl HandleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

type SuccessFn<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorFn = Box<dyn FnOnce(&ErrorMessage) + Send>;
type ProgressFn = Box<dyn FnMut(ProgressData) + Send>;
type DownloadFn = Box<dyn FnMut(u64) + Send>;
type FinalFn = Box<dyn FnOnce() + Send>;

/// Which observer lists are still accepting registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Running,
    Outcome,
    Final,
    Done,
}

struct Inner<T> {
    state: HandleState,
    phase: Phase,
    result: Option<Arc<T>>,
    error: Option<ErrorMessage>,
    released: bool,
    on_success: Vec<SuccessFn<T>>,
    on_error: Vec<ErrorFn>,
    on_progress: Vec<ProgressFn>,
    on_download: Vec<DownloadFn>,
    on_final: Vec<FinalFn>,
    progress_observers: usize,
}

struct Shared<T> {
    key: String,
    inner: Mutex<Inner<T>>,
    cancel: CancellationToken,
    released: watch::Sender<bool>,
}

/// Consumer side of one asynchronous request. Cloning is cheap and every
/// clone observes the same request.
pub struct Handle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Handle")
            .field("key", &self.shared.key)
            .field("state", &inner.state)
            .field("released", &inner.released)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Handle<T> {
    pub(crate) fn new(key: impl Into<String>) -> (Self, Completer<T>) {
        let (released, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            key: key.into(),
            inner: Mutex::new(Inner {
                state: HandleState::Created,
                phase: Phase::Running,
                result: None,
                error: None,
                released: false,
                on_success: Vec::new(),
                on_error: Vec::new(),
                on_progress: Vec::new(),
                on_download: Vec::new(),
                on_final: Vec::new(),
                progress_observers: 0,
            }),
            cancel: CancellationToken::new(),
            released,
        });
        let completer = Completer {
            shared: shared.clone(),
            leases: Vec::new(),
            finished: false,
        };
        (Self { shared }, completer)
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub fn state(&self) -> HandleState {
        self.shared.inner.lock().state
    }

    /// Present only once the handle succeeded.
    pub fn result(&self) -> Option<Arc<T>> {
        self.shared.inner.lock().result.clone()
    }

    /// Present only once the handle failed or was canceled.
    pub fn error(&self) -> Option<ErrorMessage> {
        self.shared.inner.lock().error.clone()
    }

    /// The underlying operations have been returned to the provider; the
    /// handle is inert from here on.
    pub fn is_released(&self) -> bool {
        self.shared.inner.lock().released
    }

    /// Requests cooperative cancellation. No-op once the handle is terminal.
    pub fn cancel(&self) {
        if !self.state().is_terminal() {
            self.shared.cancel.cancel();
        }
    }

    /// Resolves once the handle is terminal and released.
    pub async fn wait(&self) -> HandleState {
        let mut released = self.shared.released.subscribe();
        // The sender lives in `Shared`, which this handle keeps alive.
        let _ = released.wait_for(|released| *released).await;
        self.state()
    }

    pub fn on_success(self, f: impl FnOnce(&T) + Send + 'static) -> Self {
        let replay = {
            let mut inner = self.shared.inner.lock();
            if inner.phase <= Phase::Outcome {
                inner.on_success.push(Box::new(f));
                None
            } else {
                Some((f, inner.result.clone()))
            }
        };
        if let Some((f, Some(result))) = replay {
            f(&result);
        }
        self
    }

    pub fn on_error(self, f: impl FnOnce(&ErrorMessage) + Send + 'static) -> Self {
        let replay = {
            let mut inner = self.shared.inner.lock();
            if inner.phase <= Phase::Outcome {
                inner.on_error.push(Box::new(f));
                None
            } else {
                Some((f, inner.error.clone()))
            }
        };
        if let Some((f, Some(error))) = replay {
            f(&error);
        }
        self
    }

    pub fn on_final(self, f: impl FnOnce() + Send + 'static) -> Self {
        let replay = {
            let mut inner = self.shared.inner.lock();
            if inner.phase <= Phase::Final {
                inner.on_final.push(Box::new(f));
                None
            } else {
                Some(f)
            }
        };
        if let Some(f) = replay {
            f();
        }
        self
    }

    pub(crate) fn on_progress(self, f: impl FnMut(ProgressData) + Send + 'static) -> Self {
        {
            let mut inner = self.shared.inner.lock();
            if inner.phase == Phase::Running {
                inner.on_progress.push(Box::new(f));
                inner.progress_observers += 1;
            }
        }
        self
    }

    pub(crate) fn on_before_download(self, f: impl FnMut(u64) + Send + 'static) -> Self {
        {
            let mut inner = self.shared.inner.lock();
            if inner.phase == Phase::Running {
                inner.on_download.push(Box::new(f));
            }
        }
        self
    }
}

enum Outcome<T> {
    Succeeded(Arc<T>),
    Failed(ErrorMessage),
    Canceled(ErrorMessage),
}

/// Producer side of a [`Handle`], owned by the task that drives the request.
///
/// Finishing consumes the completer, so a handle transitions to a terminal
/// state once. Dropping an unfinished completer (task aborted or runtime
/// shut down) finishes it as canceled.
pub(crate) struct Completer<T: Send + Sync + 'static> {
    shared: Arc<Shared<T>>,
    leases: Vec<Lease>,
    finished: bool,
}

impl<T: Send + Sync + 'static> Completer<T> {
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.shared.cancel
    }

    pub fn begin(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.state == HandleState::Created {
            inner.state = HandleState::Pending;
        }
    }

    /// Keeps `lease` alive until the handle's final observers have run.
    pub fn hold(&mut self, lease: Lease) {
        self.leases.push(lease);
    }

    pub fn has_progress_observers(&self) -> bool {
        self.shared.inner.lock().progress_observers > 0
    }

    pub fn report_progress(&self, progress: ProgressData) {
        let mut observers = {
            let mut inner = self.shared.inner.lock();
            if inner.phase != Phase::Running {
                return;
            }
            std::mem::take(&mut inner.on_progress)
        };
        for observer in observers.iter_mut() {
            observer(progress);
        }
        let mut inner = self.shared.inner.lock();
        observers.append(&mut inner.on_progress);
        inner.on_progress = observers;
    }

    pub fn notify_before_download(&self, size: u64) {
        let mut observers = {
            let mut inner = self.shared.inner.lock();
            std::mem::take(&mut inner.on_download)
        };
        for observer in observers.iter_mut() {
            observer(size);
        }
        let mut inner = self.shared.inner.lock();
        observers.append(&mut inner.on_download);
        inner.on_download = observers;
    }

    pub fn succeed(mut self, value: T) {
        self.finish(Outcome::Succeeded(Arc::new(value)));
    }

    pub fn fail(mut self, error: ErrorMessage) {
        self.finish(Outcome::Failed(error));
    }

    pub fn cancelled(mut self, error: ErrorMessage) {
        self.finish(Outcome::Canceled(error));
    }

    fn finish(&mut self, outcome: Outcome<T>) {
        if self.finished {
            return;
        }
        self.finished = true;

        {
            let mut inner = self.shared.inner.lock();
            match outcome {
                Outcome::Succeeded(result) => {
                    inner.state = HandleState::Succeeded;
                    inner.result = Some(result);
                }
                Outcome::Failed(error) => {
                    inner.state = HandleState::Failed;
                    inner.error = Some(error);
                }
                Outcome::Canceled(error) => {
                    inner.state = HandleState::Canceled;
                    inner.error = Some(error);
                }
            }
            inner.phase = Phase::Outcome;
            inner.on_progress.clear();
            inner.on_download.clear();
        }

        self.dispatch_outcome();
        self.dispatch_final();

        // Release after every observer had its chance to run.
        self.leases.clear();
        self.shared.inner.lock().released = true;
        self.shared.released.send_replace(true);
    }

    /// Runs outcome observers until no new ones were attached meanwhile.
    fn dispatch_outcome(&self) {
        loop {
            let mut inner = self.shared.inner.lock();
            if let Some(result) = inner.result.clone() {
                let observers = std::mem::take(&mut inner.on_success);
                if observers.is_empty() {
                    inner.on_error.clear();
                    inner.phase = Phase::Final;
                    return;
                }
                drop(inner);
                for observer in observers {
                    observer(&result);
                }
            } else if let Some(error) = inner.error.clone() {
                let observers = std::mem::take(&mut inner.on_error);
                if observers.is_empty() {
                    inner.on_success.clear();
                    inner.phase = Phase::Final;
                    return;
                }
                drop(inner);
                for observer in observers {
                    observer(&error);
                }
            } else {
                inner.phase = Phase::Final;
                return;
            }
        }
    }

    fn dispatch_final(&self) {
        loop {
            let observers = {
                let mut inner = self.shared.inner.lock();
                let observers = std::mem::take(&mut inner.on_final);
                if observers.is_empty() {
                    inner.phase = Phase::Done;
                    return;
                }
                observers
            };
            for observer in observers {
                observer();
            }
        }
    }
}

impl<T: Send + Sync + 'static> Drop for Completer<T> {
    fn drop(&mut self) {
        if !self.finished {
            let error = ErrorMessage::builder(ErrorKind::Canceled)
                .with_message("canceled", "operation dropped before completion")
                .build();
            self.finish(Outcome::Canceled(error));
        }
    }
}

/// Fluent observer methods for a request-specific wrapper around a
/// [`Handle`] stored in its `handle` field.
macro_rules! handler_observers {
    ($handler:ty => $output:ty $(, $generic:ident: $bound:path)?) => {
        impl$(<$generic: $bound>)? $handler {
            pub fn on_success(self, f: impl FnOnce(&$output) + Send + 'static) -> Self {
                Self { handle: self.handle.on_success(f) }
            }

            pub fn on_error(
                self,
                f: impl FnOnce(&satchel_core::error::ErrorMessage) + Send + 'static,
            ) -> Self {
                Self { handle: self.handle.on_error(f) }
            }

            pub fn on_final(self, f: impl FnOnce() + Send + 'static) -> Self {
                Self { handle: self.handle.on_final(f) }
            }

            pub fn cancel(&self) {
                self.handle.cancel();
            }

            pub async fn wait(&self) -> $crate::handle::HandleState {
                self.handle.wait().await
            }

            pub fn state(&self) -> $crate::handle::HandleState {
                self.handle.state()
            }

            pub fn result(&self) -> Option<std::sync::Arc<$output>> {
                self.handle.result()
            }

            pub fn error(&self) -> Option<satchel_core::error::ErrorMessage> {
                self.handle.error()
            }

            pub fn is_released(&self) -> bool {
                self.handle.is_released()
            }

            pub fn key(&self) -> &str {
                self.handle.key()
            }

            pub fn handle(&self) -> &$crate::handle::Handle<$output> {
                &self.handle
            }
        }
    };
}

pub(crate) use handler_observers;

/// Progress and before-download observers for handlers whose request may
/// fetch remote content first.
macro_rules! download_observers {
    ($handler:ty) => {
        impl $handler {
            pub fn on_progress(
                self,
                f: impl FnMut(satchel_core::progress::ProgressData) + Send + 'static,
            ) -> Self {
                Self { handle: self.handle.on_progress(f) }
            }

            /// Called with the pending byte count when there is something
            /// to download.
            pub fn on_before_download(self, f: impl FnMut(u64) + Send + 'static) -> Self {
                Self { handle: self.handle.on_before_download(f) }
            }
        }
    };
}

pub(crate) use download_observers;
