//! Configured durations expressed as `(duration, unit)` pairs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unit of a configured duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    /// Convert an amount of this unit to a `Duration`, saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3600)),
        }
    }
}

/// A fully specified `(duration, unit)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationConfig {
    pub duration: u64,
    pub time_unit: TimeUnit,
}

impl DurationConfig {
    pub fn new(duration: u64, time_unit: TimeUnit) -> Self {
        Self {
            duration,
            time_unit,
        }
    }

    pub fn to_duration(&self) -> Duration {
        self.time_unit.to_duration(self.duration)
    }
}
