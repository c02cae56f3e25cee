//! Type-erased view of a cache used for cross-cache coordination.

use std::hash::Hash;

use crate::cache::{CacheStatistics, LruCache};

// == Cache Handle ==
/// Operations the registry and the pressure monitor need on a cache without
/// knowing its key and value types.
pub trait CacheHandle: Send + Sync {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn clear(&self);
    fn trim_to_size(&self, target: usize) -> usize;
    fn purge_expired(&self) -> usize;
    fn statistics(&self) -> CacheStatistics;
    fn reset_statistics(&self);
    fn compact(&self);
    fn stop_sweeper(&self) -> bool;
    fn detach_memory_tracker(&self);
}

impl<K, V> CacheHandle for LruCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        LruCache::name(self)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn clear(&self) {
        LruCache::clear(self)
    }

    fn trim_to_size(&self, target: usize) -> usize {
        LruCache::trim_to_size(self, target)
    }

    fn purge_expired(&self) -> usize {
        LruCache::purge_expired(self)
    }

    fn statistics(&self) -> CacheStatistics {
        LruCache::statistics(self)
    }

    fn reset_statistics(&self) {
        LruCache::reset_statistics(self)
    }

    fn compact(&self) {
        LruCache::compact(self)
    }

    fn stop_sweeper(&self) -> bool {
        LruCache::stop_sweeper(self)
    }

    fn detach_memory_tracker(&self) {
        LruCache::detach_memory_tracker(self)
    }
}
