use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::utils::async_task::spawn_task;
use crate::BackLogEntry;
use crate::CycleReport;
use crate::DeliveryContext;
use crate::Error;
use crate::FileKey;
use crate::Result;
use crate::Scheduler;
use crate::SubscribeRequest;
use crate::Subscriber;
use crate::SubscriberState;
use crate::SubscriberUpdate;
use crate::SubscriptionError;
use crate::Watermarks;
use crate::delivery::WorkerPool;

/// Result of a subscribe call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Created,
    /// The same subscription was already registered
    Unchanged,
}

/// The running subscription engine.
///
/// Administrative calls (subscribe, unsubscribe, update) are serialized
/// against each other; delivery keeps running while they execute.
pub struct SubscriptionEngine {
    ctx: Arc<DeliveryContext>,
    /// Set when the engine opened the default sled stores itself
    db: Option<Arc<sled::Db>>,
    scheduler: Arc<Scheduler>,
    scheduler_token: CancellationToken,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    admin: tokio::sync::Mutex<()>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl std::fmt::Debug for SubscriptionEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriptionEngine")
            .field("ctx", &self.ctx)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

impl SubscriptionEngine {
    pub(crate) fn new(
        ctx: Arc<DeliveryContext>,
        db: Option<Arc<sled::Db>>,
    ) -> Self {
        Self {
            db,
            scheduler: Arc::new(Scheduler::new(ctx.clone())),
            scheduler_token: ctx.shutdown.child_token(),
            scheduler_handle: Mutex::new(None),
            admin: tokio::sync::Mutex::new(()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            ctx,
        }
    }

    /// Reloads persisted subscribers, their watermarks and queued entries.
    /// Returns the number of queue entries restored.
    pub fn recover(&self) -> Result<usize> {
        let ctx = &self.ctx;
        let mut restored = 0;
        for subscriber in ctx.repository.list_subscribers()? {
            let id = subscriber.id.clone();
            if ctx.registry.contains(&id) {
                continue;
            }
            let watermarks = ctx.repository.get_watermarks(&id)?;
            let state = Arc::new(SubscriberState::new(subscriber, watermarks));
            state.restore_boundary(ctx.repository.get_accepted_boundary(&id)?);

            for entry in ctx.backlog.list_ready(&id)? {
                ctx.tracker.increment(&entry.to_candidate(), &id);
            }
            let pending = ctx.queue_store.pending(&id)?;
            for entry in &pending {
                if entry.file.backlogged {
                    state.mark_backlog_scheduled(entry.key());
                }
                ctx.tracker.increment(&entry.file, &id);
            }
            restored += state.queue().push_all(pending);

            info!(
                subscriber_id = %id,
                delivered_through = ?watermarks.delivered_through,
                queued = state.queue().len(),
                "subscriber recovered"
            );
            ctx.registry.insert(state);
        }
        Ok(restored)
    }

    /// Recovers persisted state, registers subscribers declared in
    /// configuration, starts worker pools and the scheduler. Every subscriber
    /// gets a catch-up scan on the first cycle.
    pub async fn start(&self) -> Result<()> {
        self.ensure_running()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let restored = self.recover()?;
        for declared in &self.ctx.config.subscribers {
            match self.subscribe(declared.to_request()).await {
                Ok(_) => {}
                Err(Error::Subscription(SubscriptionError::Conflict(id))) => {
                    warn!(subscriber_id = %id, "configured subscriber differs from the registered one, keeping the registered definition");
                }
                Err(e) => return Err(e),
            }
        }

        let states = self.ctx.registry.snapshot();
        for state in &states {
            WorkerPool::ensure_running(&self.ctx, state);
        }
        self.ctx
            .trigger
            .add_subscribers(states.iter().map(|s| s.id()));

        let scheduler = self.scheduler.clone();
        let token = self.scheduler_token.clone();
        *self.scheduler_handle.lock() = Some(spawn_task("scheduler", scheduler.run(token)));
        info!(subscribers = states.len(), restored, "subscription engine started");
        Ok(())
    }

    /// Runs one scheduling cycle on the caller's task with whatever triggers
    /// are pending.
    pub fn run_cycle_now(&self) -> CycleReport {
        self.scheduler.run_cycle(self.ctx.trigger.take())
    }

    /// Announces newly archived files.
    pub fn notify_new_files(
        &self,
        files: impl IntoIterator<Item = FileKey>,
    ) {
        self.ctx.trigger.add_files(files);
    }

    /// Wakes the scheduler without adding work.
    pub fn trigger(&self) {
        self.ctx.trigger.wake();
    }

    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
    ) -> Result<SubscribeOutcome> {
        self.ensure_running()?;
        let _guard = self.admin.lock().await;
        let ctx = &self.ctx;

        let id = request.subscriber_id();
        let existing = ctx.registry.get(&id);
        let fallback_start = existing
            .as_ref()
            .and_then(|s| s.subscriber().start_date)
            .unwrap_or_else(Utc::now);
        let subscriber = request.into_subscriber(&ctx.config.delivery, fallback_start);
        self.validate_subscriber(&subscriber)?;

        if let Some(state) = existing {
            if state.subscriber().same_definition(&subscriber) {
                return Ok(SubscribeOutcome::Unchanged);
            }
            return Err(SubscriptionError::Conflict(id).into());
        }

        let mut watermarks = ctx.repository.get_watermarks(&id)?;
        if starts_before_delivered(&subscriber, &watermarks) {
            ctx.repository.reset_watermarks(&id)?;
            watermarks = Watermarks::default();
        }
        ctx.repository.upsert_subscriber(&subscriber)?;

        info!(
            subscriber_id = %id,
            url = %subscriber.url,
            priority = subscriber.priority,
            start_date = ?subscriber.start_date,
            "subscriber registered"
        );
        let state = SubscriberState::new(subscriber, watermarks);
        state.restore_boundary(ctx.repository.get_accepted_boundary(&id)?);
        ctx.registry.insert(Arc::new(state));
        ctx.trigger.add_subscriber(id);
        Ok(SubscribeOutcome::Created)
    }

    /// Stops the subscriber's workers and forgets it. With `drain_to_backlog`
    /// queued entries are kept in the back-log for a later re-subscription;
    /// otherwise its back-log, queue rows and watermarks are discarded too.
    pub async fn unsubscribe(
        &self,
        subscriber_id: &str,
        drain_to_backlog: bool,
    ) -> Result<()> {
        let _guard = self.admin.lock().await;
        let ctx = &self.ctx;
        let state = ctx
            .registry
            .get(subscriber_id)
            .ok_or_else(|| SubscriptionError::UnknownSubscriber(subscriber_id.to_string()))?;

        state.mark_removed();
        ctx.stop_pool(&state, drain_to_backlog).await;
        ctx.registry.remove(subscriber_id);
        let released = ctx.tracker.release_subscriber(subscriber_id);

        if !drain_to_backlog {
            ctx.backlog.remove_subscriber(subscriber_id)?;
            ctx.queue_store.clear_subscriber(subscriber_id)?;
            ctx.repository.reset_watermarks(subscriber_id)?;
        }
        ctx.repository.delete_subscriber(subscriber_id)?;
        info!(
            subscriber_id = %subscriber_id,
            drain_to_backlog,
            released,
            "subscriber removed"
        );
        Ok(())
    }

    /// Applies a runtime change and returns the updated subscriber.
    ///
    /// Suspending drains the queue to the back-log; resuming, or moving the
    /// start date, schedules a catch-up scan. A concurrency change restarts
    /// the worker pool with the new size.
    pub async fn update_subscriber(
        &self,
        subscriber_id: &str,
        update: SubscriberUpdate,
    ) -> Result<Subscriber> {
        self.ensure_running()?;
        let _guard = self.admin.lock().await;
        let ctx = &self.ctx;
        let state = ctx
            .registry
            .get(subscriber_id)
            .ok_or_else(|| SubscriptionError::UnknownSubscriber(subscriber_id.to_string()))?;

        let current = state.subscriber();
        if update.is_empty() {
            return Ok(current);
        }
        let updated = update.apply_to(&current);
        self.validate_subscriber(&updated)?;
        ctx.repository.upsert_subscriber(&updated)?;

        if update.start_date.is_some() && starts_before_delivered(&updated, &state.watermarks()) {
            ctx.repository.reset_watermarks(subscriber_id)?;
            state.reset_watermarks();
        }
        state.set_subscriber(updated.clone());

        if updated.suspended {
            if !current.suspended {
                ctx.stop_pool(&state, true).await;
                info!(subscriber_id = %subscriber_id, "subscriber suspended");
            }
            return Ok(updated);
        }

        if current.concurrency != updated.concurrency {
            if let Some(pool) = state.take_pool() {
                pool.stop().await;
            }
        }
        WorkerPool::ensure_running(ctx, &state);
        ctx.trigger.add_subscriber(subscriber_id);
        info!(subscriber_id = %subscriber_id, ?update, "subscriber updated");
        Ok(updated)
    }

    /// Stops the scheduler and every pool, moving queued entries to the
    /// back-log. The engine cannot be restarted afterwards.
    pub async fn shutdown(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.admin.lock().await;

        self.scheduler_token.cancel();
        let handle = self.scheduler_handle.lock().take();
        if let Some(handle) = handle {
            handle.await?;
        }
        for state in self.ctx.registry.snapshot() {
            self.ctx.stop_pool(&state, true).await;
        }
        self.ctx.shutdown.cancel();
        if let Some(db) = &self.db {
            db.flush_async().await?;
        }
        info!("subscription engine stopped");
        Ok(())
    }

    pub fn subscriber(
        &self,
        subscriber_id: &str,
    ) -> Option<Subscriber> {
        self.ctx.registry.get(subscriber_id).map(|s| s.subscriber())
    }

    /// Registered subscribers ordered by id.
    pub fn subscribers(&self) -> Vec<Subscriber> {
        self.ctx
            .registry
            .snapshot()
            .iter()
            .map(|s| s.subscriber())
            .collect()
    }

    pub fn watermarks(
        &self,
        subscriber_id: &str,
    ) -> Option<Watermarks> {
        self.ctx.registry.get(subscriber_id).map(|s| s.watermarks())
    }

    pub fn backlog_entries(
        &self,
        subscriber_id: &str,
    ) -> Result<Vec<BackLogEntry>> {
        self.ctx.backlog.list_ready(subscriber_id)
    }

    /// Queued plus in-flight entries of one subscriber.
    pub fn outstanding(
        &self,
        subscriber_id: &str,
    ) -> usize {
        self.ctx
            .registry
            .get(subscriber_id)
            .map_or(0, |s| s.queue().outstanding())
    }

    pub fn reference_count(
        &self,
        key: &FileKey,
    ) -> usize {
        self.ctx.tracker.count(key)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SubscriptionError::EngineStopped.into());
        }
        Ok(())
    }

    fn validate_subscriber(
        &self,
        subscriber: &Subscriber,
    ) -> Result<()> {
        subscriber.validate(self.ctx.config.delivery.max_concurrency)?;
        if let Some(filter) = &subscriber.filter {
            if !self.ctx.predicates.contains(&filter.name) {
                return Err(SubscriptionError::UnknownPredicate(filter.name.clone()).into());
            }
        }
        Ok(())
    }
}

fn starts_before_delivered(
    subscriber: &Subscriber,
    watermarks: &Watermarks,
) -> bool {
    match (subscriber.start_date, watermarks.delivered_through) {
        (Some(start), Some(delivered)) => start < delivered,
        _ => false,
    }
}
