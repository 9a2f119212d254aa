use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::resolver::sort_candidates;
use super::DeliveryContext;
use super::SubscriberState;
use super::WorkerPool;
use crate::CandidateFile;
use crate::QueueEntry;

/// Appends accepted candidates to a subscriber's queue.
///
/// Back-log replays go first, then fresh files in ingestion order. Every
/// entry is written to the durable queue before it becomes visible to
/// workers, and the subscriber's scheduled-through watermark moves to the
/// newest fresh file.
#[derive(Debug)]
pub struct Dispatcher {
    ctx: Arc<DeliveryContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<DeliveryContext>) -> Self {
        Self { ctx }
    }

    /// Returns the number of entries queued.
    pub fn dispatch(
        &self,
        state: &Arc<SubscriberState>,
        mut replays: Vec<CandidateFile>,
        mut fresh: Vec<CandidateFile>,
    ) -> usize {
        let subscriber_id = state.id();
        sort_candidates(&mut replays);
        sort_candidates(&mut fresh);
        let newest = fresh.last().map(|f| f.ingestion_date);

        let entries: Vec<QueueEntry> = replays
            .into_iter()
            .chain(fresh)
            .filter_map(|file| {
                let entry = QueueEntry::new(subscriber_id.clone(), file);
                match self.ctx.queue_store.enqueue(&entry) {
                    Ok(true) => Some(entry),
                    Ok(false) => {
                        debug!(subscriber_id = %subscriber_id, file = %entry.key(), "already queued");
                        None
                    }
                    Err(e) => {
                        warn!(
                            subscriber_id = %subscriber_id,
                            file = %entry.key(),
                            "durable enqueue failed, queueing in memory only: {:?}",
                            e
                        );
                        Some(entry)
                    }
                }
            })
            .collect();

        let queued = state.queue().push_all(entries);
        if state.is_removed() {
            self.roll_back(state);
            return 0;
        }

        if let Some(newest) = newest {
            if state.advance_scheduled(newest) {
                if let Err(e) = self.ctx.repository.set_scheduled_through(&subscriber_id, newest) {
                    warn!(subscriber_id = %subscriber_id, "failed to persist scheduled-through: {:?}", e);
                }
            }
            let boundary = state.accepted_boundary();
            if let Err(e) = self.ctx.repository.set_accepted_boundary(&subscriber_id, &boundary) {
                warn!(subscriber_id = %subscriber_id, "failed to persist accepted boundary: {:?}", e);
            }
        }

        self.ctx.record_queue_depth(state);
        if !state.queue().is_empty() {
            WorkerPool::ensure_running(&self.ctx, state);
        }
        if queued > 0 {
            debug!(subscriber_id = %subscriber_id, queued, "dispatched");
        }
        queued
    }

    /// Undoes a dispatch that raced with unsubscribe: the pool is gone, so
    /// nothing else would ever complete these rows or release the references.
    fn roll_back(
        &self,
        state: &SubscriberState,
    ) {
        let subscriber_id = state.id();
        let entries = state.queue().drain();
        for entry in &entries {
            let key = entry.key();
            if let Err(e) = self.ctx.queue_store.complete(&subscriber_id, &key) {
                warn!(subscriber_id = %subscriber_id, file = %key, "failed to drop queue row: {:?}", e);
            }
            if entry.file.backlogged {
                state.unmark_backlog_scheduled(&key);
            } else {
                self.ctx.tracker.decrement_and_maybe_notify(&key, &subscriber_id);
            }
        }
        self.ctx.record_queue_depth(state);
        debug!(subscriber_id = %subscriber_id, dropped = entries.len(), "subscriber removed during dispatch");
    }
}
