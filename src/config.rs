//! Configuration Module
//!
//! Handles loading and validating registry configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Fraction of current occupancy kept when pressure is `High`.
pub const DEFAULT_HIGH_TRIM_RATIO: f64 = 0.7;

/// Fraction of current occupancy kept when pressure is `Critical`.
pub const DEFAULT_CRITICAL_TRIM_RATIO: f64 = 0.5;

/// Registry configuration parameters.
///
/// All values except the trim ratios can be configured via environment
/// variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity used by `get_or_create_default`
    pub default_max_size: usize,
    /// TTL used by `get_or_create_default` and by `set` without explicit TTL
    pub default_ttl: Duration,
    /// Interval between expiration sweeps of each cache
    pub sweep_interval: Duration,
    /// Interval between memory pressure checks
    pub pressure_interval: Duration,
    /// Process memory budget in bytes
    pub max_memory_bytes: u64,
    /// Occupancy kept by a `High` pressure trim
    pub high_trim_ratio: f64,
    /// Occupancy kept by a `Critical` pressure trim
    pub critical_trim_ratio: f64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_MAX_SIZE` - Default cache capacity (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 1800)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Expiration sweep interval (default: 300)
    /// - `CACHE_PRESSURE_INTERVAL_SECS` - Pressure check interval (default: 30)
    /// - `CACHE_MAX_MEMORY_MB` - Memory budget in MiB (default: 512)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_size: parse_var("CACHE_DEFAULT_MAX_SIZE")
                .unwrap_or(defaults.default_max_size),
            default_ttl: parse_var("CACHE_DEFAULT_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.default_ttl),
            sweep_interval: parse_var("CACHE_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            pressure_interval: parse_var("CACHE_PRESSURE_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.pressure_interval),
            max_memory_bytes: parse_var::<u64>("CACHE_MAX_MEMORY_MB")
                .map(|mb| mb.saturating_mul(1024 * 1024))
                .unwrap_or(defaults.max_memory_bytes),
            ..defaults
        }
    }

    /// Checks that every parameter is usable.
    pub fn validate(&self) -> Result<()> {
        if self.default_max_size == 0 {
            return Err(CacheError::InvalidConfig(
                "default_max_size must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() || self.pressure_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "background intervals must be greater than zero".to_string(),
            ));
        }
        if self.max_memory_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_memory_bytes must be greater than zero".to_string(),
            ));
        }
        for (name, ratio) in [
            ("high_trim_ratio", self.high_trim_ratio),
            ("critical_trim_ratio", self.critical_trim_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(CacheError::InvalidConfig(format!(
                    "{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_max_size: 1000,
            default_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            pressure_interval: Duration::from_secs(30),
            max_memory_bytes: 512 * 1024 * 1024,
            high_trim_ratio: DEFAULT_HIGH_TRIM_RATIO,
            critical_trim_ratio: DEFAULT_CRITICAL_TRIM_RATIO,
        }
    }
}
