//! Retry budgets for sink writes

use serde::Deserialize;
use sniffer_core::{Error, Result};
use std::time::Duration;

/// How often items and whole batches are retried
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total write attempts for an item that keeps failing transiently
    pub max_item_attempts: u32,
    /// Total attempts for a batch whose write call cannot complete
    pub max_connect_attempts: u32,
    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,
    #[serde(rename = "max_backoff_ms", with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_item_attempts: 3,
            max_connect_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based)
    ///
    /// Doubles from `initial_backoff` and never exceeds `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_item_attempts == 0 {
            return Err(Error::invalid_config("retry.max_item_attempts", "must be at least 1"));
        }
        if self.max_connect_attempts == 0 {
            return Err(Error::invalid_config(
                "retry.max_connect_attempts",
                "must be at least 1",
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(Error::invalid_config(
                "retry.initial_backoff_ms",
                "must not exceed max_backoff_ms",
            ));
        }
        Ok(())
    }
}

/// Durations written as integer milliseconds in config files
pub mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
