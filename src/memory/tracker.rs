//! Running estimate of memory held by cached entries.

use std::sync::atomic::{AtomicI64, Ordering};

// == Memory Tracker ==
/// Shared byte counter that every cache of a registry reports into.
///
/// Deltas are signed; the reported total is clamped at zero so that a racing
/// remove observed before its insert never shows up as a huge unsigned value.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    bytes: AtomicI64,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` bytes (negative to release).
    pub fn update(&self, delta: i64) {
        if delta != 0 {
            self.bytes.fetch_add(delta, Ordering::Relaxed);
        }
    }

    /// Charges an entry's estimated size.
    pub fn add(&self, size: usize) {
        self.update(i64::try_from(size).unwrap_or(i64::MAX));
    }

    /// Releases an entry's estimated size.
    pub fn release(&self, size: usize) {
        self.update(-i64::try_from(size).unwrap_or(i64::MAX));
    }

    /// Current estimate in bytes.
    pub fn total(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed).max(0) as u64
    }
}
