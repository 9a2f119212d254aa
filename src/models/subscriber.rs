use chrono::DateTime;
use chrono::Utc;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::DeliveryConfig;
use crate::Result;
use crate::SubscriptionError;

pub type SubscriberId = String;

/// Separator meaning "deliver to every URL, in order"
pub const ALL_URLS_SEPARATOR: &str = "____";
/// Separator meaning "deliver to any one URL"
pub const ANY_URL_SEPARATOR: &str = "----";

/// Reference to a registered filter predicate plus its parameter string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub name: String,
    #[serde(default)]
    pub params: String,
}

impl FilterSpec {
    pub fn new(
        name: impl Into<String>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
        }
    }
}

/// An external consumer registered to receive archived files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub url: String,
    /// Lower value means higher priority and shorter pacing
    pub priority: u32,
    /// Files ingested before this date are never delivered
    pub start_date: Option<DateTime<Utc>>,
    pub filter: Option<FilterSpec>,
    pub concurrency: usize,
    pub suspended: bool,
}

impl Subscriber {
    pub fn new(
        id: impl Into<SubscriberId>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            priority: 10,
            start_date: None,
            filter: None,
            concurrency: 1,
            suspended: false,
        }
    }

    pub fn with_priority(
        mut self,
        priority: u32,
    ) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_start_date(
        mut self,
        start_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self
    }

    pub fn with_filter(
        mut self,
        filter: Option<FilterSpec>,
    ) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_concurrency(
        mut self,
        concurrency: usize,
    ) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn validate(
        &self,
        max_concurrency: usize,
    ) -> Result<()> {
        validate_url(&self.url)?;
        if self.priority == 0 {
            return Err(SubscriptionError::InvalidPriority(self.priority).into());
        }
        if self.concurrency == 0 || self.concurrency > max_concurrency {
            return Err(SubscriptionError::InvalidConcurrency {
                requested: self.concurrency,
                max: max_concurrency,
            }
            .into());
        }
        Ok(())
    }

    /// Compares everything an administrator can set at subscribe time.
    pub fn same_definition(
        &self,
        other: &Subscriber,
    ) -> bool {
        self.id == other.id
            && self.url == other.url
            && self.priority == other.priority
            && self.start_date == other.start_date
            && self.filter == other.filter
            && self.concurrency == other.concurrency
    }

    pub fn delivery_urls(&self) -> DeliveryUrls {
        DeliveryUrls::parse(&self.url)
    }
}

/// Subscriber id derived from its URL: the URL without its query string.
pub fn subscriber_id_from_url(url: &str) -> SubscriberId {
    url.split('?').next().unwrap_or(url).to_string()
}

/// How a subscriber URL fans out to one or more endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryUrls {
    Single(String),
    /// Every URL must accept the file, tried in order
    All(Vec<String>),
    /// One URL accepting the file is enough
    Any(Vec<String>),
}

impl DeliveryUrls {
    pub fn parse(url: &str) -> Self {
        if url.contains(ALL_URLS_SEPARATOR) {
            DeliveryUrls::All(split_urls(url, ALL_URLS_SEPARATOR))
        } else if url.contains(ANY_URL_SEPARATOR) {
            DeliveryUrls::Any(split_urls(url, ANY_URL_SEPARATOR))
        } else {
            DeliveryUrls::Single(url.trim().to_string())
        }
    }

    /// URLs in attempt order. `Any` lists are shuffled on each call so load
    /// spreads across endpoints.
    pub fn attempt_order(&self) -> Vec<String> {
        match self {
            DeliveryUrls::Single(url) => vec![url.clone()],
            DeliveryUrls::All(urls) => urls.clone(),
            DeliveryUrls::Any(urls) => {
                let mut urls = urls.clone();
                urls.shuffle(&mut rand::thread_rng());
                urls
            }
        }
    }

    pub fn requires_all(&self) -> bool {
        matches!(self, DeliveryUrls::All(_))
    }

    pub fn urls(&self) -> Vec<&str> {
        match self {
            DeliveryUrls::Single(url) => vec![url.as_str()],
            DeliveryUrls::All(urls) | DeliveryUrls::Any(urls) => {
                urls.iter().map(String::as_str).collect()
            }
        }
    }
}

fn split_urls(
    url: &str,
    separator: &str,
) -> Vec<String> {
    url.split(separator)
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every component URL must be absolute http(s).
pub fn validate_url(url: &str) -> Result<()> {
    let urls = DeliveryUrls::parse(url);
    let parts = urls.urls();
    if parts.is_empty() {
        return Err(SubscriptionError::InvalidUrl(url.to_string()).into());
    }
    for part in parts {
        let parsed =
            Url::parse(part).map_err(|e| SubscriptionError::InvalidUrl(format!("{part}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SubscriptionError::InvalidUrl(format!(
                "{part}: unsupported scheme {}",
                parsed.scheme()
            ))
            .into());
        }
    }
    Ok(())
}

/// Administrative subscribe request; unset fields take configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub url: String,
    pub id: Option<SubscriberId>,
    pub priority: Option<u32>,
    pub start_date: Option<DateTime<Utc>>,
    pub filter: Option<FilterSpec>,
    pub concurrency: Option<usize>,
}

impl SubscribeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.id
            .clone()
            .unwrap_or_else(|| subscriber_id_from_url(&self.url))
    }

    /// Builds the subscriber, taking `fallback_start` when no start date was
    /// requested.
    pub fn into_subscriber(
        self,
        defaults: &DeliveryConfig,
        fallback_start: DateTime<Utc>,
    ) -> Subscriber {
        let id = self.subscriber_id();
        Subscriber {
            id,
            url: self.url,
            priority: self.priority.unwrap_or(defaults.default_priority),
            start_date: Some(self.start_date.unwrap_or(fallback_start)),
            filter: self.filter,
            concurrency: self.concurrency.unwrap_or(defaults.default_concurrency),
            suspended: false,
        }
    }
}

/// Runtime change to an existing subscriber; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberUpdate {
    pub priority: Option<u32>,
    pub url: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub concurrency: Option<usize>,
    /// `Some(None)` clears the filter
    pub filter: Option<Option<FilterSpec>>,
    pub suspended: Option<bool>,
}

impl SubscriberUpdate {
    pub fn is_empty(&self) -> bool {
        self == &SubscriberUpdate::default()
    }

    /// Returns the updated copy without touching `current`.
    pub fn apply_to(
        &self,
        current: &Subscriber,
    ) -> Subscriber {
        let mut updated = current.clone();
        if let Some(priority) = self.priority {
            updated.priority = priority;
        }
        if let Some(url) = &self.url {
            updated.url = url.clone();
        }
        if let Some(start_date) = self.start_date {
            updated.start_date = Some(start_date);
        }
        if let Some(concurrency) = self.concurrency {
            updated.concurrency = concurrency;
        }
        if let Some(filter) = &self.filter {
            updated.filter = filter.clone();
        }
        if let Some(suspended) = self.suspended {
            updated.suspended = suspended;
        }
        updated
    }
}
