use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::config_error;
use crate::Result;

/// HTTP delivery client settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Sent verbatim as the `Authorization` header when set
    #[serde(default)]
    pub authorization: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            user_agent: default_user_agent(),
            authorization: None,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(config_error("transport.request_timeout_ms must be > 0"));
        }
        if self.connect_timeout_ms > self.request_timeout_ms {
            return Err(config_error(format!(
                "transport.connect_timeout_ms ({}) exceeds request_timeout_ms ({})",
                self.connect_timeout_ms, self.request_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    120_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_user_agent() -> String {
    format!("ngas-subscription/{}", env!("CARGO_PKG_VERSION"))
}
