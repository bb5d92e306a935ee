use satchel_core::prelude::*;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

use crate::handle::Completer;

/// `interval` panics on a zero period.
pub(crate) const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) enum Polled<T> {
    Done(T),
    Canceled,
}

/// Awaits `operation` unless the handle is canceled first.
///
/// When `progress` is given, the operation's byte counters are sampled every
/// tick and reported if the handle has progress observers at that moment.
/// An operation that is already finished wins over a concurrent cancellation.
pub(crate) async fn drive<R, F>(
    completer: &Completer<R>,
    progress: Option<(&DownloadStatus, Duration)>,
    operation: F,
) -> Polled<F::Output>
where
    R: Send + Sync + 'static,
    F: Future,
{
    let cancel = completer.cancellation();
    tokio::pin!(operation);

    let Some((status, every)) = progress else {
        return tokio::select! {
            biased;
            output = &mut operation => Polled::Done(output),
            _ = cancel.cancelled() => Polled::Canceled,
        };
    };

    let mut ticker = time::interval(every.max(MIN_PROGRESS_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            output = &mut operation => return Polled::Done(output),
            _ = cancel.cancelled() => return Polled::Canceled,
            _ = ticker.tick() => {
                if completer.has_progress_observers() {
                    completer.report_progress(status.snapshot());
                }
            }
        }
    }
}

/// Closing snapshot for a successful download: done, with the current
/// count equal to the total.
pub(crate) fn finished(status: &DownloadStatus, expected: u64) -> ProgressData {
    let total = match status.total_bytes() {
        total if total > 0 => total,
        _ => i64::try_from(expected).unwrap_or(i64::MAX),
    };
    ProgressData {
        total_value: total,
        current_value: total,
        is_done: true,
    }
}

/// Human readable byte count, e.g. `"1.50 MB"`.
pub(crate) fn size_suffix(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} bytes")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
