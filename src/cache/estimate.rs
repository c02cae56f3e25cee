//! Memory size heuristics for cached values.
//!
//! These numbers feed the registry's running memory estimate. They are
//! approximations and every constant here is tunable; nothing depends on
//! them for correctness.

use std::mem::size_of;

/// Per-function estimator plugged into a cache.
pub type SizeEstimator<V> = fn(&V) -> usize;

/// Bookkeeping cost of one entry (map bucket, list node, timestamps).
pub const ENTRY_OVERHEAD: usize = 64;

/// Assumed size of a value whose heap footprint is unknown.
pub const OPAQUE_OBJECT_SIZE: usize = 100;

/// Default estimator: overhead plus the inline size of `V`.
pub fn inline<V>(_value: &V) -> usize {
    ENTRY_OVERHEAD.saturating_add(size_of::<V>())
}

/// Fixed cost for values that own heap data we cannot see into.
pub fn opaque<V>(_value: &V) -> usize {
    ENTRY_OVERHEAD.saturating_add(OPAQUE_OBJECT_SIZE)
}

/// Length-based estimate for text.
pub fn text<S: AsRef<str>>(value: &S) -> usize {
    ENTRY_OVERHEAD
        .saturating_add(size_of::<S>())
        .saturating_add(value.as_ref().len())
}

/// Length-based estimate for byte buffers.
pub fn bytes<B: AsRef<[u8]>>(value: &B) -> usize {
    ENTRY_OVERHEAD
        .saturating_add(size_of::<B>())
        .saturating_add(value.as_ref().len())
}
