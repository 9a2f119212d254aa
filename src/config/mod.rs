//! Configuration management for the subscription engine.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`NGAS__` prefix)
//! - Section-wise validation
mod delivery;
mod monitoring;
mod node;
mod scheduler;
mod subscribers;
mod transport;
pub use delivery::*;
pub use monitoring::*;
pub use node::*;
pub use scheduler::*;
pub use subscribers::*;
pub use transport::*;


use std::env;
use std::path::Path;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

pub(crate) const ENV_PREFIX: &str = "NGAS";

/// Main configuration container for the subscription engine
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// Local node identity and storage locations
    #[serde(default)]
    pub node: NodeConfig,
    /// Scheduler wake-up policy
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Worker pacing, timeouts and defaults for new subscribers
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Peer-host scanning for the designated data-mover subscriber
    #[serde(default)]
    pub data_mover: DataMoverConfig,
    /// Cache-eviction collaboration
    #[serde(default)]
    pub cache: CacheConfig,
    /// HTTP delivery client
    #[serde(default)]
    pub transport: TransportConfig,
    /// Metrics and monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Subscribers registered from configuration at startup
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

impl EngineConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in order, later ones override earlier:
    /// 1. Type defaults
    /// 2. Configuration file from `CONFIG_PATH` (if set)
    /// 3. Environment variables with `NGAS__` prefix
    ///
    /// Callers must call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("NGAS__DELIVERY__FAILURE_PAUSE_MS", "0");
    /// let cfg = EngineConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Environment variables still take precedence over the file.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.node.validate()?;
        self.scheduler.validate()?;
        self.delivery.validate()?;
        self.data_mover.validate()?;
        self.transport.validate()?;
        self.monitoring.validate()?;
        for subscriber in &self.subscribers {
            subscriber.validate(&self.delivery)?;
        }
        Ok(self)
    }
}

fn environment_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

pub(super) fn config_error(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}

pub(super) fn validate_directory(
    path: &Path,
    name: &str,
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(config_error(format!("{name} path cannot be empty")));
    }

    #[cfg(not(test))]
    {
        use std::fs;
        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                config_error(format!(
                    "Failed to create {} directory at {}: {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}
