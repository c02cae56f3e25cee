//! Error types for the cache registry
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for caches and the registry that owns them.
///
/// Factory failures inside `get_or_add` are not represented here: they are
/// the caller's own error type and are handed back unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Rejected construction parameters (zero capacity, zero budget, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cache with this name exists but holds different key/value types
    #[error("Cache '{name}' is registered with different key/value types")]
    TypeMismatch { name: String },

    /// Internal map and recency list disagree
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Process memory could not be sampled
    #[error("Memory sampling failed: {0}")]
    MemorySample(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache registry.
pub type Result<T> = std::result::Result<T, CacheError>;
