//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside foreground traffic.
//!
//! # Tasks
//! - Expiration sweep: removes expired entries from one cache at a fixed interval
//! - Memory pressure monitor: samples process memory and trims every registered cache
//!
//! Both tasks hold only weak references to what they act on and are aborted
//! when their handle is dropped.

mod pressure;
mod sweeper;

pub use pressure::MemoryPressureMonitor;
pub use sweeper::ExpirationSweeper;

pub(crate) use pressure::{apply_pressure, run_pressure_check};
