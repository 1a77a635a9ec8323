//! Remaining-file counter shared between the coordinator and telemetry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Count of files still to be processed in the current job.
///
/// Only the coordinator writes to it; telemetry and observers read it.
/// Decrements saturate at zero.
#[derive(Debug, Clone, Default)]
pub struct ProgressCounter {
    remaining: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a job of `total` files.
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.remaining.store(total, Ordering::SeqCst);
    }

    /// Clears the counter at job completion.
    pub fn clear(&self) {
        self.reset(0);
    }

    /// Records one finished file and returns the new remaining count.
    pub fn decrement(&self) -> usize {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}
