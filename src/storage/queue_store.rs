#[cfg(test)]
use mockall::automock;

use crate::FileKey;
use crate::QueueEntry;
use crate::Result;

/// Durable mirror of the in-memory delivery queues, reloaded on restart.
#[cfg_attr(test, automock)]
pub trait QueueStore: Send + Sync + 'static {
    /// Records a queued entry. An already queued key is only overwritten by a
    /// back-log replay; returns `false` when the entry was not (re)queued.
    fn enqueue(
        &self,
        entry: &QueueEntry,
    ) -> Result<bool>;

    /// Drops the row once the attempt resolved (delivered, back-logged or dropped).
    fn complete(
        &self,
        subscriber_id: &str,
        key: &FileKey,
    ) -> Result<()>;

    /// Rows left over for a subscriber, oldest ingestion date first.
    fn pending(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<QueueEntry>>;

    fn clear_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<usize>;
}
