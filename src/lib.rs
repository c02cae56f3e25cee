//! Cache Registry - named in-process caches with LRU eviction and TTL expiration
//!
//! A [`CacheRegistry`] owns independently configured [`LruCache`] instances,
//! sweeps their expired entries in the background, aggregates their
//! statistics and trims all of them when process memory approaches a budget.
//!
//! ```
//! use std::time::Duration;
//! use cache_registry::{CacheRegistry, Config};
//!
//! let registry = CacheRegistry::new(Config::default()).unwrap();
//! let layers = registry
//!     .get_or_create::<String, u64>("LayerCache", 500, Duration::from_secs(600))
//!     .unwrap();
//!
//! let id: Result<u64, std::convert::Infallible> =
//!     layers.get_or_add("Walls".to_string(), |name| Ok(name.len() as u64));
//! assert_eq!(id, Ok(5));
//! assert_eq!(registry.statistics().total_items, 1);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod registry;
pub mod tasks;

pub use cache::{CacheStatistics, LruCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use memory::{MemoryPressureLevel, MemorySampler, ProcessMemorySampler};
pub use registry::{CacheHandle, CacheManagerStatistics, CacheRegistry};
pub use tasks::{ExpirationSweeper, MemoryPressureMonitor};
