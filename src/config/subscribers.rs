use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::config_error;
use super::DeliveryConfig;
use crate::FilterSpec;
use crate::Result;
use crate::SubscribeRequest;

/// A subscriber declared in configuration, registered at startup.
///
/// ```toml
/// [[subscribers]]
/// url = "http://mirror.example.org:7777/QARCHIVE"
/// priority = 5
/// filter_name = "mime_type"
/// filter_params = "image/x-fits"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Defaults to the URL without its query string
    #[serde(default)]
    pub id: Option<String>,

    pub url: String,

    #[serde(default)]
    pub priority: Option<u32>,

    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub filter_name: Option<String>,

    #[serde(default)]
    pub filter_params: String,

    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl SubscriberConfig {
    pub fn validate(
        &self,
        delivery: &DeliveryConfig,
    ) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(config_error("subscribers.url cannot be empty"));
        }
        if self.priority == Some(0) {
            return Err(config_error(format!(
                "subscriber {}: priority must be >= 1",
                self.url
            )));
        }
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > delivery.max_concurrency {
                return Err(config_error(format!(
                    "subscriber {}: concurrency must be within 1..={}",
                    self.url, delivery.max_concurrency
                )));
            }
        }
        Ok(())
    }

    pub fn to_request(&self) -> SubscribeRequest {
        SubscribeRequest {
            url: self.url.clone(),
            id: self.id.clone(),
            priority: self.priority,
            start_date: self.start_date,
            filter: self
                .filter_name
                .as_ref()
                .map(|name| FilterSpec::new(name.clone(), self.filter_params.clone())),
            concurrency: self.concurrency,
        }
    }
}
