use std::collections::BTreeSet;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::FileKey;
use crate::SubscriberId;

/// Work requested from the scheduler since its last cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerBatch {
    /// Newly ingested files
    pub files: Vec<FileKey>,
    /// Subscribers needing a local scan (new, resumed or updated)
    pub subscribers: BTreeSet<SubscriberId>,
}

impl TriggerBatch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.subscribers.is_empty()
    }
}

/// Wake-up channel of the scheduler.
///
/// Triggers accumulate until the scheduler takes them, and a wake-up raised
/// while a cycle runs is kept for the next wait.
#[derive(Debug, Default)]
pub struct ScheduleTrigger {
    pending: Mutex<TriggerBatch>,
    notify: Notify,
}

impl ScheduleTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_files(
        &self,
        files: impl IntoIterator<Item = FileKey>,
    ) {
        self.pending.lock().files.extend(files);
        self.notify.notify_one();
    }

    pub fn add_subscriber(
        &self,
        subscriber_id: impl Into<SubscriberId>,
    ) {
        self.pending.lock().subscribers.insert(subscriber_id.into());
        self.notify.notify_one();
    }

    pub fn add_subscribers(
        &self,
        subscriber_ids: impl IntoIterator<Item = SubscriberId>,
    ) {
        self.pending.lock().subscribers.extend(subscriber_ids);
        self.notify.notify_one();
    }

    /// Requests a cycle without adding work (back-log retry, data-mover refill).
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    pub fn take(&self) -> TriggerBatch {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Puts work back after a failed cycle so the next one retries it.
    pub(crate) fn restore(
        &self,
        batch: TriggerBatch,
    ) {
        let mut pending = self.pending.lock();
        pending.files.extend(batch.files);
        pending.subscribers.extend(batch.subscribers);
    }

    /// Returns `true` if woken by a trigger, `false` on timeout.
    pub async fn wait(
        &self,
        timeout: Duration,
    ) -> bool {
        tokio::time::timeout(timeout, self.notify.notified())
            .await
            .is_ok()
    }
}
