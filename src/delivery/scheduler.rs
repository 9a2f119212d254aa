use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CandidateResolver;
use super::DeliveryContext;
use super::DeliveryNeedFilter;
use super::Dispatcher;
use super::SubscriberState;
use super::TriggerBatch;
use crate::CandidateFile;
use crate::Result;
use crate::SubscriberId;

/// Entries queued per subscriber in one cycle
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub queued: BTreeMap<SubscriberId, usize>,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.queued.values().sum()
    }

    pub fn queued_for(
        &self,
        subscriber_id: &str,
    ) -> usize {
        self.queued.get(subscriber_id).copied().unwrap_or(0)
    }
}

/// The single scheduling loop.
///
/// Sleeps until triggered or until its wake-up interval elapses, then runs
/// one cycle: resolve candidates, filter them per subscriber, dispatch.
/// Back-log replays are offered to every active subscriber on every cycle.
#[derive(Debug)]
pub struct Scheduler {
    ctx: Arc<DeliveryContext>,
    resolver: CandidateResolver,
    filter: DeliveryNeedFilter,
    dispatcher: Dispatcher,
}

impl Scheduler {
    pub fn new(ctx: Arc<DeliveryContext>) -> Self {
        Self {
            resolver: CandidateResolver::new(ctx.repository.clone(), ctx.config.data_mover.clone()),
            filter: DeliveryNeedFilter::new(ctx.predicates.clone(), ctx.tracker.clone()),
            dispatcher: Dispatcher::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn run(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> Result<()> {
        info!("scheduler started");
        loop {
            let wait = self.next_wait();
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = self.ctx.trigger.wait(wait) => {}
            }
            if token.is_cancelled() {
                break;
            }

            let batch = self.ctx.trigger.take();
            let report = self.run_cycle(batch);
            if report.total() > 0 {
                debug!(queued = report.total(), "scheduling cycle finished");
            }
        }
        info!("scheduler stopped");
        Ok(())
    }

    /// How long to sleep when nothing triggers the scheduler.
    pub fn next_wait(&self) -> Duration {
        let config = &self.ctx.config;
        let mut wait = config.scheduler.idle_wakeup();
        match self.ctx.backlog.count() {
            Ok(count) if count > 0 => wait = wait.min(config.scheduler.backlog_retry_interval()),
            Ok(_) => {}
            Err(e) => {
                warn!("failed to count back-log entries: {:?}", e);
                wait = wait.min(config.scheduler.backlog_retry_interval());
            }
        }
        if config.data_mover.enabled {
            wait = wait.min(config.data_mover.suspension());
        }
        wait
    }

    /// One scheduling cycle. Resolver failures put the batch back on the
    /// trigger so the next cycle retries it.
    pub fn run_cycle(
        &self,
        batch: TriggerBatch,
    ) -> CycleReport {
        let mut report = CycleReport::default();
        let states = self.ctx.registry.snapshot();
        if states.is_empty() {
            return report;
        }

        let explicit = match self.resolver.resolve_explicit(&batch.files) {
            Ok(files) => files,
            Err(e) => {
                warn!(files = batch.files.len(), "failed to resolve new files, retrying next cycle: {:?}", e);
                self.ctx.trigger.restore(TriggerBatch {
                    files: batch.files.clone(),
                    ..Default::default()
                });
                Vec::new()
            }
        };

        let scan_states: Vec<_> = states
            .iter()
            .filter(|s| batch.subscribers.contains(&s.id()) && !s.is_suspended())
            .cloned()
            .collect();
        let scanned = match self.resolver.resolve_local_scan(&scan_states) {
            Ok(files) => files,
            Err(e) => {
                warn!(subscribers = scan_states.len(), "local scan failed, retrying next cycle: {:?}", e);
                self.ctx.trigger.restore(TriggerBatch {
                    subscribers: scan_states.iter().map(|s| s.id()).collect(),
                    ..Default::default()
                });
                Vec::new()
            }
        };

        let backlog_count = if self.ctx.config.data_mover.enabled {
            self.ctx.backlog.count().unwrap_or(usize::MAX)
        } else {
            0
        };

        for state in &states {
            if state.is_suspended() || state.is_removed() {
                continue;
            }
            let subscriber_id = state.id();
            let scanned_for = if batch.subscribers.contains(&subscriber_id) {
                scanned.as_slice()
            } else {
                &[]
            };
            let queued = self.schedule_subscriber(state, &explicit, scanned_for, backlog_count);
            report.queued.insert(subscriber_id, queued);
        }
        report
    }

    fn schedule_subscriber(
        &self,
        state: &Arc<SubscriberState>,
        explicit: &[CandidateFile],
        scanned: &[CandidateFile],
        backlog_count: usize,
    ) -> usize {
        let subscriber_id = state.id();

        let replays: Vec<CandidateFile> = match self.ctx.backlog.list_ready(&subscriber_id) {
            Ok(entries) => entries.iter().map(|e| e.to_candidate()).collect(),
            Err(e) => {
                warn!(subscriber_id = %subscriber_id, "failed to read back-log: {:?}", e);
                Vec::new()
            }
        };
        // a back-logged file is only ever replayed, never resolved fresh
        let mut seen: HashSet<_> = replays.iter().map(|f| f.key()).collect();
        let replays: Vec<_> = replays
            .into_iter()
            .filter(|f| self.filter.should_deliver(state, f))
            .collect();

        let mut data_mover = Vec::new();
        if self.ctx.config.data_mover.enabled
            && self.ctx.config.data_mover.is_data_mover(&subscriber_id)
            && state.queue().is_empty()
        {
            match self.resolver.resolve_data_mover(state, backlog_count) {
                Ok(files) => data_mover = files,
                Err(e) => warn!(subscriber_id = %subscriber_id, "data mover scan failed: {:?}", e),
            }
        }

        let mut fresh = Vec::new();
        for file in explicit.iter().chain(scanned).chain(data_mover.iter()) {
            if seen.insert(file.key()) && self.filter.should_deliver(state, file) {
                fresh.push(file.clone());
            }
        }

        if replays.is_empty() && fresh.is_empty() {
            return 0;
        }
        self.dispatcher.dispatch(state, replays, fresh)
    }
}
