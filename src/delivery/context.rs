use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::CacheReferenceTracker;
use super::ScheduleTrigger;
use super::SubscriberRegistry;
use super::SubscriberState;
use crate::metrics::BACKLOGGED_FILES;
use crate::metrics::QUEUED_FILES;
use crate::BackLogEntry;
use crate::BackLogStore;
use crate::EngineConfig;
use crate::PredicateRegistry;
use crate::QueueEntry;
use crate::QueueStore;
use crate::Repository;
use crate::Result;
use crate::Transport;

/// Collaborators shared by the scheduler, the dispatcher and every worker.
pub struct DeliveryContext {
    pub config: Arc<EngineConfig>,
    pub repository: Arc<dyn Repository>,
    pub backlog: Arc<dyn BackLogStore>,
    pub queue_store: Arc<dyn QueueStore>,
    pub transport: Arc<dyn Transport>,
    pub tracker: Arc<CacheReferenceTracker>,
    pub predicates: Arc<PredicateRegistry>,
    pub registry: Arc<SubscriberRegistry>,
    pub trigger: Arc<ScheduleTrigger>,
    /// Parent of every worker pool token; cancelled on engine shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for DeliveryContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeliveryContext")
            .field("subscribers", &self.registry.len())
            .field("tracker", &self.tracker)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl DeliveryContext {
    /// Moves a queued or interrupted entry to the back-log. The durable queue
    /// row is only dropped once the back-log write succeeded.
    pub(crate) fn park_to_backlog(
        &self,
        state: &SubscriberState,
        entry: &QueueEntry,
    ) -> Result<()> {
        let url = state.subscriber().url;
        let key = entry.key();
        let result = self
            .backlog
            .add(&BackLogEntry::from_queue_entry(entry, &url))
            .and_then(|added| {
                if added {
                    BACKLOGGED_FILES
                        .with_label_values(&[&entry.subscriber_id])
                        .inc();
                }
                self.queue_store.complete(&entry.subscriber_id, &key)
            });
        state.unmark_backlog_scheduled(&key);
        result
    }

    /// Stops the subscriber's pool, then empties its queue: into the
    /// back-log when `to_backlog`, otherwise the entries are discarded.
    pub(crate) async fn stop_pool(
        &self,
        state: &SubscriberState,
        to_backlog: bool,
    ) {
        let subscriber_id = state.id();
        if let Some(pool) = state.take_pool() {
            pool.stop().await;
            info!(subscriber_id = %subscriber_id, "worker pool stopped");
        }

        let remaining = state.queue().drain();
        if remaining.is_empty() {
            return;
        }
        info!(
            subscriber_id = %subscriber_id,
            entries = remaining.len(),
            to_backlog,
            "draining delivery queue"
        );
        for entry in &remaining {
            if to_backlog {
                if let Err(e) = self.park_to_backlog(state, entry) {
                    error!(
                        subscriber_id = %subscriber_id,
                        file = %entry.key(),
                        "failed to move queued entry to back-log, kept in durable queue: {:?}",
                        e
                    );
                }
            } else if let Err(e) = self.queue_store.complete(&subscriber_id, &entry.key()) {
                warn!(subscriber_id = %subscriber_id, file = %entry.key(), "failed to drop queue row: {:?}", e);
            }
        }
        state.clear_backlog_scheduled();
        self.record_queue_depth(state);
    }

    pub(crate) fn record_queue_depth(
        &self,
        state: &SubscriberState,
    ) {
        QUEUED_FILES
            .with_label_values(&[&state.id()])
            .set(state.queue().len() as i64);
    }
}
