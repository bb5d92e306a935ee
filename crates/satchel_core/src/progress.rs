use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Point-in-time byte counts of an in-flight download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressData {
    pub total_value: i64,
    pub current_value: i64,
    pub is_done: bool,
}

impl Default for ProgressData {
    /// Size not yet known.
    fn default() -> Self {
        Self::new(-1, 0)
    }
}

impl ProgressData {
    pub fn new(total_value: i64, current_value: i64) -> Self {
        Self {
            total_value,
            current_value,
            is_done: false,
        }
    }

    /// Fraction in `[0, 1]`; always 1 once done or while the total is unknown.
    pub fn completed_percent(&self) -> f32 {
        if self.is_done || self.total_value <= 0 {
            return 1.0;
        }
        (self.current_value as f64 / self.total_value as f64).clamp(0.0, 1.0) as f32
    }
}

/// Byte counters written by a provider while an operation runs and read by
/// the handle that polls it.
#[derive(Debug, Clone)]
pub struct DownloadStatus {
    inner: Arc<StatusInner>,
}

#[derive(Debug)]
struct StatusInner {
    total_bytes: AtomicI64,
    downloaded_bytes: AtomicU64,
    done: AtomicBool,
}

impl Default for DownloadStatus {
    fn default() -> Self {
        Self {
            inner: Arc::new(StatusInner {
                total_bytes: AtomicI64::new(-1),
                downloaded_bytes: AtomicU64::new(0),
                done: AtomicBool::new(false),
            }),
        }
    }
}

impl DownloadStatus {
    pub fn set_total(&self, total: u64) {
        let total = i64::try_from(total).unwrap_or(i64::MAX);
        self.inner.total_bytes.store(total, Ordering::Release);
    }

    pub fn add_downloaded(&self, bytes: u64) {
        self.inner
            .downloaded_bytes
            .fetch_add(bytes, Ordering::AcqRel);
    }

    pub fn mark_done(&self) {
        self.inner.done.store(true, Ordering::Release);
    }

    pub fn total_bytes(&self) -> i64 {
        self.inner.total_bytes.load(Ordering::Acquire)
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.inner.downloaded_bytes.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressData {
        let current = i64::try_from(self.downloaded_bytes()).unwrap_or(i64::MAX);
        ProgressData {
            total_value: self.total_bytes(),
            current_value: current,
            is_done: self.is_done(),
        }
    }
}
