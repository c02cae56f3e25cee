//! Cache Module
//!
//! Provides thread-safe in-memory caches with TTL expiration and LRU eviction.

mod entry;
pub mod estimate;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use estimate::SizeEstimator;
pub use stats::{CacheStatistics, CacheStats};
pub use store::LruCache;

pub(crate) use lru::LruTracker;
pub(crate) use stats::hit_ratio;
