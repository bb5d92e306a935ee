use crate::progress::DownloadStatus;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    DownloadSize,
    Download,
    LoadScene,
    UnloadScene,
    LoadAsset,
    Instantiate,
}

/// The provider-side resource behind one asynchronous step.
///
/// A provider may attach state to the id while the operation runs; the
/// runtime hands the handle back through [`ResourceProvider::release`]
/// exactly once when the owning request reaches a terminal state.
///
/// [`ResourceProvider::release`]: crate::traits::ResourceProvider::release
#[derive(Debug)]
pub struct OperationHandle {
    id: OperationId,
    kind: OperationKind,
    key: String,
    status: DownloadStatus,
}

impl OperationHandle {
    pub fn new(kind: OperationKind, key: impl Into<String>) -> Self {
        Self {
            id: OperationId(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            key: key.into(),
            status: DownloadStatus::default(),
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> &DownloadStatus {
        &self.status
    }
}
