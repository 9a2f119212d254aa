use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::config_error;
use crate::Result;

/// Scheduler wake-up policy
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on the wait between cycles while the back-log is non-empty
    #[serde(default = "default_backlog_retry_interval_ms")]
    pub backlog_retry_interval_ms: u64,

    /// Periodic timeout fallback when nothing triggers the scheduler
    #[serde(default = "default_idle_wakeup_ms")]
    pub idle_wakeup_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backlog_retry_interval_ms: default_backlog_retry_interval_ms(),
            idle_wakeup_ms: default_idle_wakeup_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backlog_retry_interval_ms == 0 {
            return Err(config_error("scheduler.backlog_retry_interval_ms must be > 0"));
        }
        if self.idle_wakeup_ms < self.backlog_retry_interval_ms {
            return Err(config_error(format!(
                "scheduler.idle_wakeup_ms ({}) must be >= backlog_retry_interval_ms ({})",
                self.idle_wakeup_ms, self.backlog_retry_interval_ms
            )));
        }
        Ok(())
    }

    pub fn backlog_retry_interval(&self) -> Duration {
        Duration::from_millis(self.backlog_retry_interval_ms)
    }

    pub fn idle_wakeup(&self) -> Duration {
        Duration::from_millis(self.idle_wakeup_ms)
    }
}

/// Data-mover mode: scan a fixed list of peer hosts on behalf of one subscriber
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DataMoverConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Peer host ids whose files are scanned
    #[serde(default)]
    pub hosts: Vec<String>,

    /// The designated subscriber fed by the scan
    #[serde(default)]
    pub subscriber_id: Option<String>,

    #[serde(default = "default_data_mover_suspension_ms")]
    pub suspension_ms: u64,

    /// Row limit for a single peer scan
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Scans are suppressed while the back-log holds more entries than this
    #[serde(default = "default_max_backlog")]
    pub max_backlog: usize,
}

impl Default for DataMoverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hosts: Vec::new(),
            subscriber_id: None,
            suspension_ms: default_data_mover_suspension_ms(),
            max_records: default_max_records(),
            max_backlog: default_max_backlog(),
        }
    }
}

impl DataMoverConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.hosts.is_empty() {
            return Err(config_error("data_mover.hosts cannot be empty when enabled"));
        }
        if self.subscriber_id.as_deref().map_or(true, |s| s.trim().is_empty()) {
            return Err(config_error(
                "data_mover.subscriber_id is required when enabled",
            ));
        }
        if self.max_records == 0 {
            return Err(config_error("data_mover.max_records must be > 0"));
        }
        Ok(())
    }

    pub fn suspension(&self) -> Duration {
        Duration::from_millis(self.suspension_ms)
    }

    pub fn is_data_mover(
        &self,
        subscriber_id: &str,
    ) -> bool {
        self.enabled && self.subscriber_id.as_deref() == Some(subscriber_id)
    }
}

fn default_backlog_retry_interval_ms() -> u64 {
    10_000
}
fn default_idle_wakeup_ms() -> u64 {
    60_000
}
fn default_data_mover_suspension_ms() -> u64 {
    60_000
}
fn default_max_records() -> usize {
    1000
}
fn default_max_backlog() -> usize {
    1000
}
