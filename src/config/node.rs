use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use super::config_error;
use super::validate_directory;
use crate::Result;

/// Identity of the archive node the engine runs on
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    /// Host id used to select locally held files for new-subscriber scans
    #[serde(default = "default_host_id")]
    pub host_id: String,

    /// Root directory of the embedded sled database
    #[serde(default = "default_db_root_dir")]
    pub db_root_dir: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host_id: default_host_id(),
            db_root_dir: default_db_root_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host_id.trim().is_empty() {
            return Err(config_error("node.host_id cannot be empty"));
        }
        validate_directory(&self.db_root_dir, "db_root_dir")?;
        validate_directory(&self.log_dir, "log_dir")?;
        Ok(())
    }
}

fn default_host_id() -> String {
    "localhost".to_string()
}
fn default_db_root_dir() -> PathBuf {
    PathBuf::from("/tmp/ngas/db")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp/ngas/logs")
}
