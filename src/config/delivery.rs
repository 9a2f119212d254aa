use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::config_error;
use crate::Result;

/// Delivery worker behavior and defaults for new subscriptions
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeliveryConfig {
    /// Bounded wait on an empty queue between cancellation checks
    #[serde(default = "default_queue_wait_timeout_ms")]
    pub queue_wait_timeout_ms: u64,

    /// Pause after a failed attempt before the worker takes the next entry
    #[serde(default = "default_failure_pause_ms")]
    pub failure_pause_ms: u64,

    /// Pacing added per priority step above 1
    #[serde(default = "default_priority_delay_unit_ms")]
    pub priority_delay_unit_ms: u64,

    #[serde(default = "default_max_priority_delay_ms")]
    pub max_priority_delay_ms: u64,

    #[serde(default = "default_priority")]
    pub default_priority: u32,

    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_wait_timeout_ms: default_queue_wait_timeout_ms(),
            failure_pause_ms: default_failure_pause_ms(),
            priority_delay_unit_ms: default_priority_delay_unit_ms(),
            max_priority_delay_ms: default_max_priority_delay_ms(),
            default_priority: default_priority(),
            default_concurrency: default_concurrency(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_wait_timeout_ms == 0 {
            return Err(config_error("delivery.queue_wait_timeout_ms must be > 0"));
        }
        if self.default_priority == 0 {
            return Err(config_error("delivery.default_priority must be >= 1"));
        }
        if self.max_concurrency == 0 {
            return Err(config_error("delivery.max_concurrency must be >= 1"));
        }
        if self.default_concurrency == 0 || self.default_concurrency > self.max_concurrency {
            return Err(config_error(format!(
                "delivery.default_concurrency {} must be within 1..={}",
                self.default_concurrency, self.max_concurrency
            )));
        }
        Ok(())
    }

    pub fn queue_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_wait_timeout_ms)
    }

    pub fn failure_pause(&self) -> Duration {
        Duration::from_millis(self.failure_pause_ms)
    }

    /// Delay applied before each transport call; priority 1 is not paced.
    pub fn pacing_delay(
        &self,
        priority: u32,
    ) -> Duration {
        let steps = u64::from(priority.saturating_sub(1));
        let delay = steps.saturating_mul(self.priority_delay_unit_ms);
        Duration::from_millis(delay.min(self.max_priority_delay_ms))
    }
}

/// Collaboration with the cache-eviction policy
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// When disabled the reference tracker is a no-op
    #[serde(default)]
    pub enabled: bool,
}

fn default_queue_wait_timeout_ms() -> u64 {
    1000
}
fn default_failure_pause_ms() -> u64 {
    3000
}
fn default_priority_delay_unit_ms() -> u64 {
    10
}
fn default_max_priority_delay_ms() -> u64 {
    1000
}
fn default_priority() -> u32 {
    10
}
fn default_concurrency() -> usize {
    1
}
fn default_max_concurrency() -> usize {
    32
}
