//! Memory Pressure Monitor
//!
//! Background task that samples process memory and trims every cache of a
//! registry proportionally when the memory budget is being approached.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::memory::MemoryPressureLevel;
use crate::registry::RegistryInner;

// == Memory Pressure Monitor ==
/// Handle to a running pressure monitor. Dropping it stops the task.
#[derive(Debug)]
pub struct MemoryPressureMonitor {
    handle: JoinHandle<()>,
}

impl MemoryPressureMonitor {
    /// Spawns the monitor on the current tokio runtime, or returns `None`
    /// outside one.
    pub(crate) fn spawn(registry: &Arc<RegistryInner>, interval: Duration) -> Option<Self> {
        let runtime = Handle::try_current().ok()?;
        let weak = Arc::downgrade(registry);

        let handle = runtime.spawn(async move {
            info!("Starting memory pressure monitor with interval of {:?}", interval);

            loop {
                tokio::time::sleep(interval).await;

                let Some(registry) = weak.upgrade() else {
                    debug!("Registry dropped, stopping memory pressure monitor");
                    break;
                };

                if catch_unwind(AssertUnwindSafe(|| run_pressure_check(&registry))).is_err() {
                    error!("Memory pressure check panicked; retrying next interval");
                }
            }
        });

        Some(Self { handle })
    }

    /// Stops the monitor.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for MemoryPressureMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One monitor tick: sample, classify, trim.
pub(crate) fn run_pressure_check(registry: &RegistryInner) -> MemoryPressureLevel {
    let used = registry.sample_working_set();
    let level = MemoryPressureLevel::classify(used, registry.config.max_memory_bytes);
    let previous = registry.swap_level(level);

    if level != previous {
        if level >= MemoryPressureLevel::High {
            warn!(
                "Memory pressure {} -> {} ({} of {} bytes)",
                previous, level, used, registry.config.max_memory_bytes
            );
        } else {
            info!("Memory pressure {} -> {}", previous, level);
        }
    } else {
        debug!("Memory pressure {} ({} bytes)", level, used);
    }

    let evicted = apply_pressure(registry, level);
    if evicted > 0 {
        info!("Memory pressure {}: evicted {} entries", level, evicted);
    }
    level
}

/// Trims every cache according to `level`. Returns entries evicted.
///
/// Caches are trimmed one after another with no lock spanning them; each
/// `trim_to_size` synchronizes on its own cache only.
pub(crate) fn apply_pressure(registry: &RegistryInner, level: MemoryPressureLevel) -> usize {
    let ratio = match level {
        MemoryPressureLevel::Low | MemoryPressureLevel::Medium => return 0,
        MemoryPressureLevel::High => registry.config.high_trim_ratio,
        MemoryPressureLevel::Critical => registry.config.critical_trim_ratio,
    };

    let handles = registry.handles();
    let evicted: usize = handles
        .iter()
        .map(|cache| {
            // Rounded down: a single entry trims to zero
            let target = (cache.len() as f64 * ratio) as usize;
            cache.trim_to_size(target)
        })
        .sum();

    if level == MemoryPressureLevel::Critical {
        // Hand spare map and list capacity back to the allocator
        for cache in &handles {
            cache.compact();
        }
    }
    evicted
}
