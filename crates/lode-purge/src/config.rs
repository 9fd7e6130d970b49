//! Purge configuration.

use lode_core::TimeUnit;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Delay used when no cycle delay is configured.
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(2);

/// Default number of primary keys covered by one delete batch.
pub const DEFAULT_LIMIT: u64 = 500;

/// Delay between purge cycles as read from configuration.
///
/// Both parts are optional: a missing duration falls back to 2 and a
/// missing unit falls back to seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDelay {
    pub duration: Option<u64>,
    pub time_unit: Option<TimeUnit>,
}

impl CycleDelay {
    pub fn new(duration: u64, time_unit: TimeUnit) -> Self {
        CycleDelay {
            duration: Some(duration),
            time_unit: Some(time_unit),
        }
    }

    pub fn to_duration(&self) -> Duration {
        let duration = self.duration.unwrap_or(DEFAULT_CYCLE_DELAY.as_secs());
        self.time_unit
            .unwrap_or(TimeUnit::Seconds)
            .to_duration(duration)
    }
}

/// Configuration for purge queues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurgeConfig {
    /// Primary keys covered by one delete batch. Must be positive.
    pub limit: u64,

    /// Delay between cycles. A malformed value is dropped with a warning.
    #[serde(deserialize_with = "lenient_cycle_delay")]
    pub cycle_delay: Option<CycleDelay>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

fn lenient_cycle_delay<'de, D>(deserializer: D) -> Result<Option<CycleDelay>, D::Error>
where
    D: Deserializer<'de>,
{
    match Lenient::<Option<CycleDelay>>::deserialize(deserializer)? {
        Lenient::Valid(delay) => Ok(delay),
        Lenient::Invalid(_) => {
            tracing::warn!(
                default = ?DEFAULT_CYCLE_DELAY,
                "Ignoring malformed purge cycle delay"
            );
            Ok(None)
        }
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            cycle_delay: None,
        }
    }
}

impl PurgeConfig {
    /// Effective delay between cycles.
    pub fn cycle_delay(&self) -> Duration {
        self.cycle_delay
            .map(|delay| delay.to_duration())
            .unwrap_or(DEFAULT_CYCLE_DELAY)
    }
}

/// Builder for purge configuration.
pub struct PurgeConfigBuilder {
    config: PurgeConfig,
}

impl PurgeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PurgeConfig::default(),
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn cycle_delay(mut self, duration: u64, time_unit: TimeUnit) -> Self {
        self.config.cycle_delay = Some(CycleDelay::new(duration, time_unit));
        self
    }

    pub fn build(self) -> PurgeConfig {
        self.config
    }
}

impl Default for PurgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_config_builder() {
        let config = PurgeConfigBuilder::new()
            .limit(100)
            .cycle_delay(250, TimeUnit::Milliseconds)
            .build();

        assert_eq!(config.limit, 100);
        assert_eq!(config.cycle_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_delay_falls_back() {
        assert_eq!(PurgeConfig::default().cycle_delay(), DEFAULT_CYCLE_DELAY);

        let no_duration = CycleDelay {
            duration: None,
            time_unit: Some(TimeUnit::Minutes),
        };
        assert_eq!(no_duration.to_duration(), Duration::from_secs(120));

        let no_unit = CycleDelay {
            duration: Some(5),
            time_unit: None,
        };
        assert_eq!(no_unit.to_duration(), Duration::from_secs(5));

        assert_eq!(CycleDelay::default().to_duration(), DEFAULT_CYCLE_DELAY);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PurgeConfig =
            serde_json::from_str(r#"{ "cycle_delay": { "duration": 10 } }"#).unwrap();
        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert_eq!(config.cycle_delay(), Duration::from_secs(10));

        let config: PurgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PurgeConfig::default());
    }

    #[test]
    fn test_malformed_delay_falls_back() {
        let config: PurgeConfig = serde_json::from_str(
            r#"{ "limit": 10, "cycle_delay": { "duration": 5, "time_unit": "fortnights" } }"#,
        )
        .unwrap();
        assert_eq!(config.limit, 10);
        assert_eq!(config.cycle_delay, None);
        assert_eq!(config.cycle_delay(), DEFAULT_CYCLE_DELAY);

        let config: PurgeConfig =
            serde_json::from_str(r#"{ "cycle_delay": "soon" }"#).unwrap();
        assert_eq!(config.cycle_delay(), DEFAULT_CYCLE_DELAY);

        let config: PurgeConfig = serde_json::from_str(r#"{ "cycle_delay": null }"#).unwrap();
        assert_eq!(config.cycle_delay, None);
    }
}
