//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with value and timing metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was inserted or last replaced
    pub created_at: Instant,
    /// Last successful read or write
    pub last_accessed: Instant,
    /// Point from which the entry is considered expired
    pub expires_at: Instant,
    /// Estimated bytes charged to the memory tracker for this entry
    pub size: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry stamped at `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Lifetime of the entry; a zero TTL is expired on arrival
    /// * `size` - Estimated size of the entry in bytes
    pub fn new(value: V, ttl: Duration, size: usize) -> Self {
        Self::new_at(value, ttl, size, Instant::now())
    }

    /// Same as [`CacheEntry::new`] with an explicit timestamp.
    pub fn new_at(value: V, ttl: Duration, size: usize, now: Instant) -> Self {
        // Instant overflow only happens for absurd TTLs; treat them as "never"
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 3600));

        Self {
            value,
            created_at: now,
            last_accessed: now,
            expires_at,
            size,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired when `now >= expires_at`, so an
    /// entry stored with a zero TTL is never returned to a reader.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Expiry check against a caller-supplied instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Touch ==
    /// Records a read at `now`.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed = now;
    }
}
