//! Aggregate statistics across every registered cache.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{hit_ratio, CacheStatistics};
use crate::memory::MemoryPressureLevel;

// == Cache Manager Statistics ==
/// Point-in-time snapshot of a whole registry.
#[derive(Debug, Clone, Serialize)]
pub struct CacheManagerStatistics {
    pub cache_count: usize,
    pub total_items: usize,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_evictions: u64,
    pub total_expirations: u64,
    /// total_hits / (total_hits + total_misses), 0.0 without lookups
    pub hit_ratio: f64,
    /// Estimated bytes held by all caches
    pub total_memory_usage: u64,
    /// Configured memory budget in bytes
    pub max_memory_usage: u64,
    pub pressure_level: MemoryPressureLevel,
    /// Per-cache snapshots ordered by name
    pub caches: Vec<CacheStatistics>,
    pub sampled_at: DateTime<Utc>,
}

impl CacheManagerStatistics {
    /// Sums per-cache snapshots into a registry-wide view.
    pub fn aggregate(
        mut caches: Vec<CacheStatistics>,
        total_memory_usage: u64,
        max_memory_usage: u64,
        pressure_level: MemoryPressureLevel,
    ) -> Self {
        caches.sort_by(|a, b| a.name.cmp(&b.name));

        let total_hits = caches.iter().map(|c| c.hits).sum();
        let total_misses = caches.iter().map(|c| c.misses).sum();

        Self {
            cache_count: caches.len(),
            total_items: caches.iter().map(|c| c.item_count).sum(),
            total_hits,
            total_misses,
            total_evictions: caches.iter().map(|c| c.evictions).sum(),
            total_expirations: caches.iter().map(|c| c.expirations).sum(),
            hit_ratio: hit_ratio(total_hits, total_misses),
            total_memory_usage,
            max_memory_usage,
            pressure_level,
            caches,
            sampled_at: Utc::now(),
        }
    }
}
