//! Cache registry implementation

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{estimate, LruCache, SizeEstimator};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::memory::{MemoryPressureLevel, MemorySampler, MemoryTracker, ProcessMemorySampler};
use crate::registry::{CacheHandle, CacheManagerStatistics};
use crate::tasks::{apply_pressure, run_pressure_check, ExpirationSweeper, MemoryPressureMonitor};

/// A registered cache seen two ways: erased for coordination, `Any` for
/// downcasting back to `LruCache<K, V>` at typed call sites.
struct RegisteredCache {
    handle: Arc<dyn CacheHandle>,
    typed: Arc<dyn Any + Send + Sync>,
    key_type: &'static str,
    value_type: &'static str,
}

impl RegisteredCache {
    fn downcast<K, V>(&self, name: &str) -> Result<Arc<LruCache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Arc::clone(&self.typed)
            .downcast::<LruCache<K, V>>()
            .map_err(|_| {
                warn!(
                    "Cache '{}' holds <{}, {}>, requested <{}, {}>",
                    name,
                    self.key_type,
                    self.value_type,
                    type_name::<K>(),
                    type_name::<V>()
                );
                CacheError::TypeMismatch {
                    name: name.to_string(),
                }
            })
    }
}

/// State shared between the registry and its pressure monitor.
pub(crate) struct RegistryInner {
    pub(crate) config: Config,
    caches: RwLock<HashMap<String, RegisteredCache>>,
    memory: Arc<MemoryTracker>,
    sampler: Arc<dyn MemorySampler>,
    last_level: AtomicU8,
    sample_warned: AtomicBool,
}

impl RegistryInner {
    /// Snapshot of every registered cache. The registry lock is released
    /// before the caller touches any cache.
    pub(crate) fn handles(&self) -> Vec<Arc<dyn CacheHandle>> {
        self.caches
            .read()
            .values()
            .map(|entry| Arc::clone(&entry.handle))
            .collect()
    }

    /// Current working set, or the tracked estimate when sampling fails.
    pub(crate) fn sample_working_set(&self) -> u64 {
        match self.sampler.working_set() {
            Ok(bytes) => bytes,
            Err(e) => {
                if !self.sample_warned.swap(true, Ordering::Relaxed) {
                    warn!("{}; using tracked cache estimate instead", e);
                } else {
                    debug!("{}; using tracked cache estimate instead", e);
                }
                self.memory.total()
            }
        }
    }

    pub(crate) fn classify_now(&self) -> MemoryPressureLevel {
        MemoryPressureLevel::classify(self.sample_working_set(), self.config.max_memory_bytes)
    }

    /// Records the latest level, returning the previous one.
    pub(crate) fn swap_level(&self, level: MemoryPressureLevel) -> MemoryPressureLevel {
        MemoryPressureLevel::from_u8(self.last_level.swap(level.as_u8(), Ordering::Relaxed))
    }
}

// == Cache Registry ==
/// Owner of a set of named, independently configured caches.
///
/// Callers fetch a typed cache once with [`CacheRegistry::get_or_create`] and
/// then talk to it directly. The registry itself only aggregates statistics
/// and, through its background monitor, trims every cache under memory
/// pressure.
pub struct CacheRegistry {
    inner: Arc<RegistryInner>,
    monitor: Mutex<Option<MemoryPressureMonitor>>,
}

impl CacheRegistry {
    /// Create a registry that samples the real process memory.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_sampler(config, Arc::new(ProcessMemorySampler))
    }

    /// Create a registry with a custom memory sampler.
    ///
    /// The pressure monitor is started when called inside a tokio runtime.
    pub fn with_sampler(config: Config, sampler: Arc<dyn MemorySampler>) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing cache registry (max_memory: {} bytes, sweep_interval: {:?}, pressure_interval: {:?})",
            config.max_memory_bytes, config.sweep_interval, config.pressure_interval
        );

        let pressure_interval = config.pressure_interval;
        let inner = Arc::new(RegistryInner {
            config,
            caches: RwLock::new(HashMap::new()),
            memory: Arc::new(MemoryTracker::new()),
            sampler,
            last_level: AtomicU8::new(MemoryPressureLevel::Low.as_u8()),
            sample_warned: AtomicBool::new(false),
        });

        let monitor = MemoryPressureMonitor::spawn(&inner, pressure_interval);
        if monitor.is_none() {
            debug!("No tokio runtime; memory pressure monitor not started");
        }

        Ok(Self {
            inner,
            monitor: Mutex::new(monitor),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // == Get Or Create ==
    /// Returns the cache registered under `name`, creating it if absent.
    ///
    /// The first registration wins: for an existing name `max_size` and
    /// `default_ttl` are ignored. Requesting an existing name with different
    /// key/value types fails with [`CacheError::TypeMismatch`].
    pub fn get_or_create<K, V>(
        &self,
        name: &str,
        max_size: usize,
        default_ttl: Duration,
    ) -> Result<Arc<LruCache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.get_or_create_with_estimator(name, max_size, default_ttl, estimate::inline::<V>)
    }

    /// [`CacheRegistry::get_or_create`] with the configured default size and TTL.
    pub fn get_or_create_default<K, V>(&self, name: &str) -> Result<Arc<LruCache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let config = &self.inner.config;
        self.get_or_create(name, config.default_max_size, config.default_ttl)
    }

    /// [`CacheRegistry::get_or_create`] with a custom size heuristic for the
    /// memory estimate. The estimator is ignored if the cache already exists.
    pub fn get_or_create_with_estimator<K, V>(
        &self,
        name: &str,
        max_size: usize,
        default_ttl: Duration,
        estimator: SizeEstimator<V>,
    ) -> Result<Arc<LruCache<K, V>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(entry) = self.inner.caches.read().get(name) {
            return entry.downcast(name);
        }

        let mut caches = self.inner.caches.write();
        // Another caller may have registered it between the two locks
        if let Some(entry) = caches.get(name) {
            return entry.downcast(name);
        }

        let cache = Arc::new(
            LruCache::new(name, max_size, default_ttl)?
                .with_estimator(estimator)
                .with_memory_tracker(Arc::clone(&self.inner.memory)),
        );
        if let Some(sweeper) = ExpirationSweeper::spawn(&cache, self.inner.config.sweep_interval) {
            cache.attach_sweeper(sweeper);
        }

        let handle: Arc<dyn CacheHandle> = cache.clone();
        let typed: Arc<dyn Any + Send + Sync> = cache.clone();
        caches.insert(
            name.to_string(),
            RegisteredCache {
                handle,
                typed,
                key_type: type_name::<K>(),
                value_type: type_name::<V>(),
            },
        );

        info!(
            "Created cache '{}' (max_size: {}, default_ttl: {:?})",
            name, max_size, default_ttl
        );
        Ok(cache)
    }

    /// Looks up an existing cache without creating one.
    pub fn get<K, V>(&self, name: &str) -> Result<Option<Arc<LruCache<K, V>>>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match self.inner.caches.read().get(name) {
            Some(entry) => entry.downcast(name).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.caches.read().contains_key(name)
    }

    /// Registered cache names, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.caches.read().is_empty()
    }

    // == Remove / Clear ==
    /// Stops the cache's sweep, clears it and deregisters it.
    ///
    /// Callers still holding the `Arc` keep a working but unregistered cache
    /// whose memory no longer counts toward the registry's total.
    pub fn remove_cache(&self, name: &str) -> bool {
        let removed = self.inner.caches.write().remove(name);
        match removed {
            Some(entry) => {
                entry.handle.stop_sweeper();
                entry.handle.clear();
                entry.handle.detach_memory_tracker();
                info!("Removed cache '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Clears every cache; registrations are kept.
    pub fn clear_all(&self) {
        let handles = self.inner.handles();
        for handle in &handles {
            handle.clear();
        }
        info!("Cleared {} caches", handles.len());
    }

    /// Removes expired entries from every cache now. Returns entries removed.
    ///
    /// Useful where no runtime drives the background sweeps.
    pub fn purge_expired(&self) -> usize {
        let removed: usize = self
            .inner
            .handles()
            .iter()
            .map(|handle| handle.purge_expired())
            .sum();
        if removed > 0 {
            debug!("Purged {} expired entries across caches", removed);
        }
        removed
    }

    /// Zeroes hit/miss/eviction counters of every cache.
    pub fn reset_statistics(&self) {
        for handle in self.inner.handles() {
            handle.reset_statistics();
        }
    }

    // == Statistics ==
    /// Aggregated snapshot across all caches, with a fresh pressure sample.
    pub fn statistics(&self) -> CacheManagerStatistics {
        let caches = self
            .inner
            .handles()
            .iter()
            .map(|handle| handle.statistics())
            .collect();

        CacheManagerStatistics::aggregate(
            caches,
            self.total_memory_usage(),
            self.max_memory_usage(),
            self.inner.classify_now(),
        )
    }

    // == Memory ==
    /// Adjusts the running memory estimate by `delta` bytes.
    pub fn update_memory_usage(&self, delta: i64) {
        self.inner.memory.update(delta);
    }

    /// Estimated bytes held by all caches.
    pub fn total_memory_usage(&self) -> u64 {
        self.inner.memory.total()
    }

    /// Configured memory budget in bytes.
    pub fn max_memory_usage(&self) -> u64 {
        self.inner.config.max_memory_bytes
    }

    /// Samples process memory and classifies it now.
    pub fn memory_pressure_level(&self) -> MemoryPressureLevel {
        self.inner.classify_now()
    }

    /// Level observed by the most recent pressure check.
    pub fn last_pressure_level(&self) -> MemoryPressureLevel {
        MemoryPressureLevel::from_u8(self.inner.last_level.load(Ordering::Relaxed))
    }

    /// Runs one pressure check immediately, trimming caches if needed.
    pub fn check_memory_pressure(&self) -> MemoryPressureLevel {
        run_pressure_check(&self.inner)
    }

    /// Applies the trim policy for `level` without sampling.
    ///
    /// Returns the number of entries evicted.
    pub fn apply_memory_pressure(&self, level: MemoryPressureLevel) -> usize {
        apply_pressure(&self.inner, level)
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|monitor| !monitor.is_finished())
    }

    // == Shutdown ==
    /// Cancels background tasks and clears every cache.
    pub fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.stop();
        }
        let handles = self.inner.handles();
        for handle in &handles {
            handle.stop_sweeper();
            handle.clear();
        }
        info!("Cache registry shut down ({} caches cleared)", handles.len());
    }
}

impl Drop for CacheRegistry {
    fn drop(&mut self) {
        self.monitor.lock().take();
        for handle in self.inner.handles() {
            handle.stop_sweeper();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct FixedSampler(AtomicU64);

    impl MemorySampler for FixedSampler {
        fn working_set(&self) -> Result<u64> {
            Ok(self.0.load(Ordering::Relaxed))
        }
    }

    struct FailingSampler;

    impl MemorySampler for FailingSampler {
        fn working_set(&self) -> Result<u64> {
            Err(CacheError::MemorySample("unavailable".to_string()))
        }
    }

    fn registry_with(used: u64) -> (CacheRegistry, Arc<FixedSampler>) {
        let sampler = Arc::new(FixedSampler(AtomicU64::new(used)));
        let config = Config {
            max_memory_bytes: 1000,
            ..Config::default()
        };
        let registry = CacheRegistry::with_sampler(config, sampler.clone()).unwrap();
        (registry, sampler)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (registry, _) = registry_with(0);

        let a = registry
            .get_or_create::<String, u32>("X", 10, Duration::from_secs(60))
            .unwrap();
        let b = registry
            .get_or_create::<String, u32>("X", 999, Duration::from_secs(1))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.max_size(), 10, "First registration wins");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_type_mismatch() {
        let (registry, _) = registry_with(0);
        registry
            .get_or_create::<String, u32>("X", 10, Duration::from_secs(60))
            .unwrap();

        let err = registry
            .get_or_create::<String, String>("X", 10, Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::TypeMismatch {
                name: "X".to_string()
            }
        );
        assert!(registry.get::<u64, u32>("X").is_err());
    }

    #[test]
    fn test_invalid_size_leaves_registry_untouched() {
        let (registry, _) = registry_with(0);

        let result = registry.get_or_create::<String, u32>("bad", 0, Duration::from_secs(60));

        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
        assert!(!registry.contains("bad"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = Config {
            max_memory_bytes: 0,
            ..Config::default()
        };
        assert!(CacheRegistry::new(config).is_err());
    }

    #[test]
    fn test_default_creation_uses_config() {
        let (registry, _) = registry_with(0);
        let cache = registry.get_or_create_default::<u32, u32>("defaults").unwrap();

        assert_eq!(cache.max_size(), registry.config().default_max_size);
        assert_eq!(cache.default_ttl(), registry.config().default_ttl);
    }

    #[test]
    fn test_get_existing_and_missing() {
        let (registry, _) = registry_with(0);
        assert!(registry.get::<u32, u32>("nope").unwrap().is_none());

        let created = registry
            .get_or_create::<u32, u32>("yes", 4, Duration::from_secs(60))
            .unwrap();
        let found = registry.get::<u32, u32>("yes").unwrap().unwrap();
        assert!(Arc::ptr_eq(&created, &found));
    }

    #[test]
    fn test_remove_cache() {
        let (registry, _) = registry_with(0);
        let cache = registry
            .get_or_create::<u32, u32>("gone", 4, Duration::from_secs(60))
            .unwrap();
        cache.set(1, 1);

        assert!(registry.remove_cache("gone"));
        assert!(!registry.remove_cache("gone"));
        assert!(cache.is_empty());
        assert!(!registry.contains("gone"));

        let fresh = registry
            .get_or_create::<u32, u32>("gone", 8, Duration::from_secs(60))
            .unwrap();
        assert!(!Arc::ptr_eq(&cache, &fresh));
        assert_eq!(fresh.max_size(), 8);
    }

    #[test]
    fn test_removed_cache_no_longer_counts_toward_memory() {
        let (registry, _) = registry_with(0);
        let kept = registry.get_or_create::<u32, u32>("kept", 4, Duration::from_secs(60)).unwrap();
        let orphan = registry.get_or_create::<u32, u32>("orphan", 4, Duration::from_secs(60)).unwrap();
        kept.set(1, 1);
        orphan.set(1, 1);
        let one_entry = registry.total_memory_usage() / 2;

        registry.remove_cache("orphan");
        orphan.set(2, 2);
        orphan.set(3, 3);

        assert_eq!(orphan.len(), 2);
        assert_eq!(registry.total_memory_usage(), one_entry);
        assert_eq!(registry.statistics().total_memory_usage, one_entry);
    }

    #[test]
    fn test_purge_expired_across_caches() {
        let (registry, _) = registry_with(0);
        let a = registry.get_or_create::<u32, u32>("a", 4, Duration::from_secs(60)).unwrap();
        let b = registry.get_or_create::<u32, u32>("b", 4, Duration::from_secs(60)).unwrap();
        a.set_with_ttl(1, 1, Duration::ZERO);
        a.set(2, 2);
        b.set_with_ttl(1, 1, Duration::ZERO);

        assert_eq!(registry.purge_expired(), 2);
        assert_eq!(a.keys(), vec![2]);
        assert!(b.is_empty());
        assert_eq!(registry.statistics().total_expirations, 2);
    }

    #[test]
    fn test_clear_all_keeps_registrations() {
        let (registry, _) = registry_with(0);
        let a = registry.get_or_create::<u32, u32>("a", 4, Duration::from_secs(60)).unwrap();
        let b = registry.get_or_create::<u32, u32>("b", 4, Duration::from_secs(60)).unwrap();
        a.set(1, 1);
        b.set(2, 2);

        registry.clear_all();

        assert!(a.is_empty() && b.is_empty());
        assert_eq!(registry.cache_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.total_memory_usage(), 0);
    }

    #[test]
    fn test_statistics_aggregate() {
        let (registry, _) = registry_with(100);
        let a = registry.get_or_create::<u32, u32>("a", 4, Duration::from_secs(60)).unwrap();
        let b = registry.get_or_create::<u32, u32>("b", 4, Duration::from_secs(60)).unwrap();
        a.set(1, 1);
        a.get(&1);
        b.get(&1);
        b.get(&2);

        let stats = registry.statistics();
        assert_eq!(stats.cache_count, 2);
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.total_hits, 1);
        assert_eq!(stats.total_misses, 2);
        assert!((stats.hit_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.max_memory_usage, 1000);
        assert_eq!(stats.total_memory_usage, registry.total_memory_usage());
        assert_eq!(stats.pressure_level, MemoryPressureLevel::Low);

        registry.reset_statistics();
        let stats = registry.statistics();
        assert_eq!(stats.total_hits + stats.total_misses, 0);
    }

    #[test]
    fn test_memory_usage_tracking() {
        let (registry, _) = registry_with(0);
        let cache = registry
            .get_or_create_with_estimator::<u32, String>(
                "text",
                10,
                Duration::from_secs(60),
                estimate::text::<String>,
            )
            .unwrap();

        cache.set(1, "abcdef".to_string());
        let expected = estimate::text(&"abcdef".to_string()) as u64;
        assert_eq!(registry.total_memory_usage(), expected);

        registry.update_memory_usage(10);
        assert_eq!(registry.total_memory_usage(), expected + 10);
        registry.update_memory_usage(-10);

        cache.clear();
        assert_eq!(registry.total_memory_usage(), 0);
    }

    #[test]
    fn test_pressure_levels_trim_proportionally() {
        let (registry, sampler) = registry_with(100);
        let cache = registry
            .get_or_create::<u32, u32>("big", 1000, Duration::from_secs(60))
            .unwrap();
        for i in 0..100 {
            cache.set(i, i);
        }

        // Low: untouched
        assert_eq!(registry.check_memory_pressure(), MemoryPressureLevel::Low);
        assert_eq!(cache.len(), 100);

        // Medium: untouched
        sampler.0.store(600, Ordering::Relaxed);
        assert_eq!(registry.check_memory_pressure(), MemoryPressureLevel::Medium);
        assert_eq!(cache.len(), 100);

        // High: 70% of current
        sampler.0.store(800, Ordering::Relaxed);
        assert_eq!(registry.check_memory_pressure(), MemoryPressureLevel::High);
        assert_eq!(cache.len(), 70);

        // Critical: 50% of current, oldest entries first
        sampler.0.store(950, Ordering::Relaxed);
        assert_eq!(registry.check_memory_pressure(), MemoryPressureLevel::Critical);
        assert_eq!(cache.len(), 35);
        assert!(cache.contains_key(&99));
        assert!(!cache.contains_key(&30));
        assert_eq!(registry.last_pressure_level(), MemoryPressureLevel::Critical);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_failing_sampler_falls_back_to_estimate() {
        let config = Config {
            max_memory_bytes: 1000,
            ..Config::default()
        };
        let registry = CacheRegistry::with_sampler(config, Arc::new(FailingSampler)).unwrap();
        assert_eq!(registry.memory_pressure_level(), MemoryPressureLevel::Low);

        registry.update_memory_usage(950);
        assert_eq!(registry.memory_pressure_level(), MemoryPressureLevel::Critical);
    }

    #[test]
    fn test_no_monitor_outside_runtime() {
        let (registry, _) = registry_with(0);
        assert!(!registry.is_monitoring());
    }

    #[test]
    fn test_shutdown_clears_caches() {
        let (registry, _) = registry_with(0);
        let cache = registry.get_or_create::<u32, u32>("a", 4, Duration::from_secs(60)).unwrap();
        cache.set(1, 1);

        registry.shutdown();

        assert!(cache.is_empty());
        assert_eq!(registry.total_memory_usage(), 0);
    }
}
