//! Memory Module
//!
//! Process memory estimation, sampling and pressure classification.
//!
//! # Components
//! - `MemoryTracker`: running estimate of bytes held by all caches
//! - `MemorySampler`: source of the process working set
//! - `MemoryPressureLevel`: working set / budget classification

mod level;
mod sampler;
mod tracker;

pub use level::MemoryPressureLevel;
pub use sampler::{MemorySampler, ProcessMemorySampler};
pub use tracker::MemoryTracker;
