//! Delivery transport: push one file to a subscriber endpoint and interpret
//! the answer as pass or fail.
mod http;
mod status;
pub use http::*;
pub use status::*;

#[cfg(test)]
mod status_test;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::warn;

use crate::CandidateFile;
use crate::DeliveryUrls;
use crate::Result;
use crate::TransportError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends the file to a single URL. Any `Err` is a delivery failure.
    async fn deliver(
        &self,
        url: &str,
        file: &CandidateFile,
    ) -> Result<()>;
}

/// Delivers to every URL of an all-list (stopping at the first failure) or
/// to the first accepting URL of an any-list.
pub async fn deliver_to_urls(
    transport: &dyn Transport,
    urls: &DeliveryUrls,
    file: &CandidateFile,
) -> Result<()> {
    let order = urls.attempt_order();
    if urls.requires_all() {
        for url in &order {
            transport.deliver(url, file).await?;
        }
        return Ok(());
    }

    let mut last_error = None;
    for url in &order {
        match transport.deliver(url, file).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if order.len() > 1 {
                    warn!(url = %url, file = %file.key(), "delivery failed, trying next URL: {}", e);
                }
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| TransportError::InvalidUrl("no delivery URL".to_string()).into()))
}
