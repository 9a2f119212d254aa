use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use super::config_error;
use crate::Result;

/// Prometheus endpoint of the service binary
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus_enabled: bool,

    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,

    /// Interface the `/metrics` endpoint binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: false,
            prometheus_port: default_prometheus_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl MonitoringConfig {
    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.prometheus_port)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.prometheus_enabled {
            if self.prometheus_port != default_prometheus_port() {
                warn!(
                    port = self.prometheus_port,
                    "prometheus_port is set but the metrics endpoint is disabled"
                );
            }
            return Ok(());
        }
        match self.prometheus_port {
            0 => Err(config_error("monitoring.prometheus_port must be set when enabled")),
            port if port < 1024 => Err(config_error(format!(
                "monitoring.prometheus_port {port} is privileged"
            ))),
            _ => Ok(()),
        }
    }
}

fn default_prometheus_port() -> u16 {
    9100
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
