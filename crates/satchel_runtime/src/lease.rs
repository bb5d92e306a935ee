use satchel_core::prelude::*;
use tracing::trace;

type ReleaseFn = Box<dyn FnOnce(&OperationHandle) + Send + Sync>;

/// Owns one [`OperationHandle`] and returns it to its provider when dropped.
///
/// The release closure is taken on the first drop, so a lease can never
/// release twice, and a task that is aborted mid-await still releases
/// every lease it holds.
pub struct Lease {
    op: OperationHandle,
    release: Option<ReleaseFn>,
}

impl Lease {
    pub fn acquire<P: ResourceProvider>(provider: &P, kind: OperationKind, key: &str) -> Self {
        let provider = provider.clone();
        let op = OperationHandle::new(kind, key);
        trace!("acquire {} {:?} {}", op.id(), kind, key);
        Self {
            op,
            release: Some(Box::new(move |op| provider.release(op))),
        }
    }

    pub fn operation(&self) -> &OperationHandle {
        &self.op
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            trace!("release {} {:?}", self.op.id(), self.op.kind());
            release(&self.op);
        }
    }
}
