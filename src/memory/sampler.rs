//! Process memory sampling.

use crate::error::{CacheError, Result};

// == Memory Sampler ==
/// Source of the current process working set in bytes.
///
/// The registry's pressure monitor calls this once per tick.
pub trait MemorySampler: Send + Sync {
    fn working_set(&self) -> Result<u64>;
}

// == Process Memory Sampler ==
/// Reads the resident set size of the current process.
///
/// On Linux this parses `VmRSS` from `/proc/self/status`; other platforms
/// report an error and the registry falls back to its tracked estimate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemorySampler;

impl MemorySampler for ProcessMemorySampler {
    #[cfg(target_os = "linux")]
    fn working_set(&self) -> Result<u64> {
        let status = std::fs::read_to_string("/proc/self/status")
            .map_err(|e| CacheError::MemorySample(format!("/proc/self/status: {}", e)))?;
        parse_vm_rss(&status)
            .ok_or_else(|| CacheError::MemorySample("VmRSS not found".to_string()))
    }

    #[cfg(not(target_os = "linux"))]
    fn working_set(&self) -> Result<u64> {
        Err(CacheError::MemorySample(
            "process memory sampling is only supported on Linux".to_string(),
        ))
    }
}

/// Extracts `VmRSS` (reported in kB) as bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb.saturating_mul(1024))
}
