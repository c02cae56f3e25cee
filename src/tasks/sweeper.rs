//! TTL Expiration Sweep
//!
//! Background task that periodically removes expired entries from one cache.

use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::LruCache;

// == Expiration Sweeper ==
/// Handle to a running expiration sweep. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirationSweeper {
    handle: JoinHandle<()>,
}

impl ExpirationSweeper {
    /// Spawns a sweep over `cache` on the current tokio runtime.
    ///
    /// The task sleeps for `interval`, then removes every entry expired at
    /// that moment through the cache's per-key removal path. It keeps only a
    /// weak reference and exits once the cache is dropped. A pass that panics
    /// is logged and the next pass runs on schedule.
    ///
    /// Returns `None` when called outside a tokio runtime; lazy expiration on
    /// read still applies to such caches.
    pub fn spawn<K, V>(cache: &Arc<LruCache<K, V>>, interval: Duration) -> Option<Self>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().ok()?;
        let weak = Arc::downgrade(cache);
        let name = cache.name().to_string();

        let handle = runtime.spawn(async move {
            debug!(cache = %name, ?interval, "Starting expiration sweep");

            loop {
                tokio::time::sleep(interval).await;

                let Some(cache) = weak.upgrade() else {
                    debug!(cache = %name, "Cache dropped, stopping expiration sweep");
                    break;
                };

                match catch_unwind(AssertUnwindSafe(|| cache.purge_expired())) {
                    Ok(0) => debug!(cache = %name, "Expiration sweep: no expired entries found"),
                    Ok(removed) => {
                        info!(cache = %name, removed, "Expiration sweep: removed expired entries")
                    }
                    Err(_) => error!(cache = %name, "Expiration sweep panicked; retrying next interval"),
                }
            }
        });

        Some(Self { handle })
    }

    /// Stops the sweep.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ExpirationSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
