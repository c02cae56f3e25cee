//! Memory pressure classification.

use std::fmt;

use serde::Serialize;

// == Memory Pressure Level ==
/// How close the process is to its memory budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryPressureLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressureLevel {
    /// Classifies `used / budget`: below 0.5 is Low, below 0.7 Medium,
    /// below 0.9 High, anything else Critical.
    pub fn classify(used: u64, budget: u64) -> Self {
        if budget == 0 {
            return Self::Critical;
        }
        Self::from_ratio(used as f64 / budget as f64)
    }

    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.5 {
            Self::Low
        } else if ratio < 0.7 {
            Self::Medium
        } else if ratio < 0.9 {
            Self::High
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for MemoryPressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
