use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DeliveryContext;
use super::SubscriberState;
use crate::deliver_to_urls;
use crate::metrics::DELIVERED_FILES;
use crate::metrics::DELIVERY_DURATION;
use crate::metrics::DELIVERY_FAILURES;
use crate::metrics::DROPPED_FILES;
use crate::utils::async_task::sleep_or_cancelled;
use crate::utils::async_task::spawn_task;
use crate::CandidateFile;
use crate::QueueEntry;
use crate::Result;

/// How one queue entry was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeliveryOutcome {
    Delivered,
    /// Transport failure; the entry is now in the back-log
    Failed,
    /// Back-logged file no longer on storage; the entry was discarded
    Dropped,
    /// Storage unit unavailable; the back-log entry is kept for later
    Deferred,
    /// Ingested before the subscriber's current start date
    Skipped,
    /// Cancelled before or during the transport call; moved to the back-log
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerStep {
    Continue,
    Stop,
}

/// The running workers of one subscriber. Stopping cancels their shared
/// token and waits for every worker to exit.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn start(
        ctx: &Arc<DeliveryContext>,
        state: &Arc<SubscriberState>,
        size: usize,
    ) -> Self {
        let token = ctx.shutdown.child_token();
        let subscriber_id = state.id();
        let handles = (0..size)
            .map(|index| {
                let worker = DeliveryWorker {
                    index,
                    ctx: ctx.clone(),
                    state: state.clone(),
                    token: token.clone(),
                };
                spawn_task(&format!("delivery-worker-{subscriber_id}-{index}"), worker.run())
            })
            .collect();
        info!(subscriber_id = %subscriber_id, size, "worker pool started");
        Self { token, handles }
    }

    /// Starts the subscriber's pool if it has none. Returns `true` if started.
    pub(crate) fn ensure_running(
        ctx: &Arc<DeliveryContext>,
        state: &Arc<SubscriberState>,
    ) -> bool {
        state.ensure_pool(|size| WorkerPool::start(ctx, state, size))
    }

    pub(crate) fn size(&self) -> usize {
        self.handles.len()
    }

    pub(crate) async fn stop(self) {
        self.token.cancel();
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!("delivery worker terminated abnormally: {:?}", e);
            }
        }
    }
}

pub(crate) struct DeliveryWorker {
    index: usize,
    ctx: Arc<DeliveryContext>,
    state: Arc<SubscriberState>,
    token: CancellationToken,
}

impl DeliveryWorker {
    pub(crate) fn new(
        index: usize,
        ctx: Arc<DeliveryContext>,
        state: Arc<SubscriberState>,
        token: CancellationToken,
    ) -> Self {
        Self {
            index,
            ctx,
            state,
            token,
        }
    }

    pub(crate) async fn run(self) -> Result<()> {
        debug!(subscriber_id = %self.state.id(), worker = self.index, "delivery worker started");
        while self.step().await == WorkerStep::Continue {}
        debug!(subscriber_id = %self.state.id(), worker = self.index, "delivery worker stopped");
        Ok(())
    }

    /// Waits for one entry and resolves it.
    pub(crate) async fn step(&self) -> WorkerStep {
        if self.token.is_cancelled() || self.state.is_removed() {
            return WorkerStep::Stop;
        }

        let wait = self.ctx.config.delivery.queue_wait_timeout();
        let entry = tokio::select! {
            biased;
            _ = self.token.cancelled() => return WorkerStep::Stop,
            entry = self.state.queue().pop(wait) => entry,
        };

        let Some(entry) = entry else {
            // idle data mover asks for its next page
            if self.index == 0 && self.ctx.config.data_mover.is_data_mover(&self.state.id()) {
                self.ctx.trigger.wake();
            }
            return WorkerStep::Continue;
        };

        let outcome = self.process(&entry).await;
        self.state.queue().finish();
        self.ctx.record_queue_depth(&self.state);

        let pause = match outcome {
            DeliveryOutcome::Failed => self.ctx.config.delivery.failure_pause(),
            DeliveryOutcome::Interrupted => return WorkerStep::Stop,
            _ => Duration::ZERO,
        };
        if !sleep_or_cancelled(pause, &self.token).await {
            return WorkerStep::Stop;
        }
        WorkerStep::Continue
    }

    pub(crate) async fn process(
        &self,
        entry: &QueueEntry,
    ) -> DeliveryOutcome {
        let file = &entry.file;
        let subscriber = self.state.subscriber();

        if !file.backlogged {
            if let Some(start) = subscriber.start_date {
                if file.ingestion_date < start {
                    info!(
                        subscriber_id = %subscriber.id,
                        file = %file.key(),
                        "skipping file ingested before the current start date"
                    );
                    self.complete_queue_row(entry);
                    self.ctx
                        .tracker
                        .decrement_and_maybe_notify(&file.key(), &subscriber.id);
                    return DeliveryOutcome::Skipped;
                }
            }
        } else if let Some(outcome) = self.check_backlogged_file(entry) {
            return outcome;
        }

        // lower priorities wait before every transport call
        let pacing = self.ctx.config.delivery.pacing_delay(subscriber.priority);
        if !sleep_or_cancelled(pacing, &self.token).await {
            self.park(entry);
            return DeliveryOutcome::Interrupted;
        }

        let urls = subscriber.delivery_urls();
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            result = deliver_to_urls(self.ctx.transport.as_ref(), &urls, file) => Some(result),
        };

        match result {
            None => {
                info!(subscriber_id = %subscriber.id, file = %file.key(), "delivery interrupted");
                self.park(entry);
                DeliveryOutcome::Interrupted
            }
            Some(Ok(())) => {
                DELIVERY_DURATION
                    .with_label_values(&[&subscriber.id])
                    .observe(started.elapsed().as_secs_f64());
                self.on_delivered(entry);
                DeliveryOutcome::Delivered
            }
            Some(Err(e)) => {
                DELIVERY_FAILURES.with_label_values(&[&subscriber.id]).inc();
                warn!(
                    subscriber_id = %subscriber.id,
                    file = %file.key(),
                    "delivery failed, moving to back-log: {}",
                    e
                );
                self.park(entry);
                DeliveryOutcome::Failed
            }
        }
    }

    /// Resolves a replay whose file is gone; `None` when it is still on disk.
    fn check_backlogged_file(
        &self,
        entry: &QueueEntry,
    ) -> Option<DeliveryOutcome> {
        let file = &entry.file;
        if file.file_name.exists() {
            return None;
        }

        let subscriber_id = &entry.subscriber_id;
        let key = file.key();
        if self.mount_point_present(file) {
            error!(
                subscriber_id = %subscriber_id,
                file = %key,
                path = %file.file_name.display(),
                "back-logged file no longer on storage, dropping"
            );
            if let Err(e) = self.ctx.backlog.remove(subscriber_id, &key) {
                warn!(subscriber_id = %subscriber_id, file = %key, "failed to remove back-log entry: {:?}", e);
            }
            self.complete_queue_row(entry);
            self.state.unmark_backlog_scheduled(&key);
            self.ctx
                .tracker
                .decrement_and_maybe_notify(&key, subscriber_id);
            DROPPED_FILES.with_label_values(&[subscriber_id]).inc();
            Some(DeliveryOutcome::Dropped)
        } else {
            info!(
                subscriber_id = %subscriber_id,
                file = %key,
                storage_unit = %file.storage_unit_id,
                "storage unit unavailable, keeping back-log entry"
            );
            self.complete_queue_row(entry);
            self.state.unmark_backlog_scheduled(&key);
            Some(DeliveryOutcome::Deferred)
        }
    }

    fn mount_point_present(
        &self,
        file: &CandidateFile,
    ) -> bool {
        match self.ctx.repository.mount_point(&file.storage_unit_id) {
            Ok(Some(mount_point)) => mount_point.exists(),
            Ok(None) => false,
            Err(e) => {
                warn!(storage_unit = %file.storage_unit_id, "mount point lookup failed: {:?}", e);
                false
            }
        }
    }

    fn on_delivered(
        &self,
        entry: &QueueEntry,
    ) {
        let file = &entry.file;
        let subscriber_id = &entry.subscriber_id;
        let key = file.key();

        DELIVERED_FILES.with_label_values(&[subscriber_id]).inc();
        if self.state.advance_delivered(file.ingestion_date) {
            if let Err(e) = self
                .ctx
                .repository
                .set_delivered_through(subscriber_id, file.ingestion_date)
            {
                warn!(subscriber_id = %subscriber_id, "failed to persist delivered-through: {:?}", e);
            }
        }
        if file.backlogged {
            if let Err(e) = self.ctx.backlog.remove(subscriber_id, &key) {
                warn!(subscriber_id = %subscriber_id, file = %key, "failed to remove back-log entry: {:?}", e);
            }
            self.state.unmark_backlog_scheduled(&key);
        }
        self.complete_queue_row(entry);
        self.ctx
            .tracker
            .decrement_and_maybe_notify(&key, subscriber_id);
        info!(subscriber_id = %subscriber_id, file = %key, backlogged = file.backlogged, "file delivered");
    }

    fn park(
        &self,
        entry: &QueueEntry,
    ) {
        if let Err(e) = self.ctx.park_to_backlog(&self.state, entry) {
            error!(
                subscriber_id = %entry.subscriber_id,
                file = %entry.key(),
                "failed to back-log entry, kept in durable queue: {:?}",
                e
            );
        }
    }

    fn complete_queue_row(
        &self,
        entry: &QueueEntry,
    ) {
        if let Err(e) = self.ctx.queue_store.complete(&entry.subscriber_id, &entry.key()) {
            warn!(subscriber_id = %entry.subscriber_id, file = %entry.key(), "failed to complete queue row: {:?}", e);
        }
    }
}
