//! Registry Module
//!
//! Owns named caches, aggregates their statistics and coordinates
//! memory-pressure trimming across them.

mod handle;
mod manager;
mod stats;

pub use handle::CacheHandle;
pub use manager::CacheRegistry;
pub use stats::CacheManagerStatistics;

pub(crate) use manager::RegistryInner;
