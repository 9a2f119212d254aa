#[cfg(test)]
use mockall::automock;

use crate::BackLogEntry;
use crate::FileKey;
use crate::Result;

/// Durable record of deliveries still to be confirmed.
///
/// `add` is written through before it returns, so an entry survives a crash
/// immediately after the call.
#[cfg_attr(test, automock)]
pub trait BackLogStore: Send + Sync + 'static {
    /// Idempotent upsert keyed by (subscriber, file id, version).
    /// Returns `true` if a new entry was written.
    fn add(
        &self,
        entry: &BackLogEntry,
    ) -> Result<bool>;

    /// Returns `true` if an entry was removed.
    fn remove(
        &self,
        subscriber_id: &str,
        key: &FileKey,
    ) -> Result<bool>;

    /// All entries of one subscriber, oldest ingestion date first.
    fn list_ready(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<BackLogEntry>>;

    fn remove_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<usize>;

    fn count(&self) -> Result<usize>;
}
