use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;

use super::DeliveryQueue;
use super::WorkerPool;
use crate::AcceptedBoundary;
use crate::FileKey;
use crate::ScanCursor;
use crate::Subscriber;
use crate::SubscriberId;
use crate::Watermarks;

/// Everything the engine tracks for one subscriber, each part behind its own
/// lock so independent subscribers never contend.
pub struct SubscriberState {
    subscriber: RwLock<Subscriber>,
    watermarks: Mutex<Watermarks>,
    queue: Arc<DeliveryQueue>,
    /// Back-log replays currently queued or in flight
    scheduled_backlog: Mutex<HashSet<FileKey>>,
    /// Fresh files accepted at the newest accepted ingestion date
    boundary: Mutex<AcceptedBoundary>,
    /// Data-mover scan position
    checked_through: Mutex<Option<ScanCursor>>,
    pool: Mutex<Option<WorkerPool>>,
    removed: AtomicBool,
}

impl std::fmt::Debug for SubscriberState {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SubscriberState")
            .field("id", &self.subscriber.read().id)
            .field("watermarks", &*self.watermarks.lock())
            .field("queued", &self.queue.len())
            .field("in_flight", &self.queue.in_flight())
            .finish()
    }
}

impl SubscriberState {
    pub fn new(
        subscriber: Subscriber,
        watermarks: Watermarks,
    ) -> Self {
        Self {
            subscriber: RwLock::new(subscriber),
            watermarks: Mutex::new(watermarks.normalized()),
            queue: Arc::new(DeliveryQueue::new()),
            scheduled_backlog: Mutex::new(HashSet::new()),
            boundary: Mutex::new(AcceptedBoundary::default()),
            checked_through: Mutex::new(None),
            pool: Mutex::new(None),
            removed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.subscriber.read().id.clone()
    }

    pub fn subscriber(&self) -> Subscriber {
        self.subscriber.read().clone()
    }

    pub fn is_suspended(&self) -> bool {
        self.subscriber.read().suspended
    }

    pub(crate) fn set_subscriber(
        &self,
        subscriber: Subscriber,
    ) {
        *self.subscriber.write() = subscriber;
    }

    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn watermarks(&self) -> Watermarks {
        *self.watermarks.lock()
    }

    pub(crate) fn advance_scheduled(
        &self,
        date: DateTime<Utc>,
    ) -> bool {
        self.watermarks.lock().advance_scheduled(date)
    }

    pub(crate) fn advance_delivered(
        &self,
        date: DateTime<Utc>,
    ) -> bool {
        self.watermarks.lock().advance_delivered(date)
    }

    pub(crate) fn reset_watermarks(&self) {
        *self.watermarks.lock() = Watermarks::default();
        *self.boundary.lock() = AcceptedBoundary::default();
        *self.checked_through.lock() = None;
    }

    /// Records a fresh acceptance so a file sharing the watermark's
    /// ingestion date is told apart from one already scheduled.
    pub(crate) fn note_accepted(
        &self,
        key: FileKey,
        ingestion_date: DateTime<Utc>,
    ) {
        self.boundary.lock().note(key, ingestion_date);
    }

    pub(crate) fn accepted_at(
        &self,
        key: &FileKey,
        ingestion_date: DateTime<Utc>,
    ) -> bool {
        self.boundary.lock().contains(key, ingestion_date)
    }

    pub fn accepted_boundary(&self) -> AcceptedBoundary {
        self.boundary.lock().clone()
    }

    pub(crate) fn restore_boundary(
        &self,
        boundary: AcceptedBoundary,
    ) {
        *self.boundary.lock() = boundary;
    }

    /// Returns `false` if the replay is already scheduled.
    pub(crate) fn mark_backlog_scheduled(
        &self,
        key: FileKey,
    ) -> bool {
        self.scheduled_backlog.lock().insert(key)
    }

    pub(crate) fn unmark_backlog_scheduled(
        &self,
        key: &FileKey,
    ) {
        self.scheduled_backlog.lock().remove(key);
    }

    pub(crate) fn clear_backlog_scheduled(&self) {
        self.scheduled_backlog.lock().clear();
    }

    pub fn checked_through(&self) -> Option<ScanCursor> {
        self.checked_through.lock().clone()
    }

    pub(crate) fn advance_checked_through(
        &self,
        cursor: ScanCursor,
    ) {
        let mut checked = self.checked_through.lock();
        if checked.as_ref().map_or(true, |c| *c < cursor) {
            *checked = Some(cursor);
        }
    }

    /// Installs a pool built by `start` unless one is running, the subscriber
    /// is suspended, or it was removed. Returns `true` if a pool was started.
    pub(crate) fn ensure_pool(
        &self,
        start: impl FnOnce(usize) -> WorkerPool,
    ) -> bool {
        let mut pool = self.pool.lock();
        if pool.is_some() || self.is_removed() || self.is_suspended() {
            return false;
        }
        *pool = Some(start(self.subscriber.read().concurrency));
        true
    }

    pub(crate) fn take_pool(&self) -> Option<WorkerPool> {
        self.pool.lock().take()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.lock().as_ref().map_or(0, WorkerPool::size)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

/// Owner of all per-subscriber state; read by every component, mutated only
/// through the engine's administrative calls.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    states: DashMap<SubscriberId, Arc<SubscriberState>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        subscriber_id: &str,
    ) -> Option<Arc<SubscriberState>> {
        self.states.get(subscriber_id).map(|s| s.value().clone())
    }

    pub fn contains(
        &self,
        subscriber_id: &str,
    ) -> bool {
        self.states.contains_key(subscriber_id)
    }

    pub(crate) fn insert(
        &self,
        state: Arc<SubscriberState>,
    ) -> Option<Arc<SubscriberState>> {
        self.states.insert(state.id(), state)
    }

    pub(crate) fn remove(
        &self,
        subscriber_id: &str,
    ) -> Option<Arc<SubscriberState>> {
        self.states.remove(subscriber_id).map(|(_, state)| state)
    }

    /// All states ordered by subscriber id.
    pub fn snapshot(&self) -> Vec<Arc<SubscriberState>> {
        let mut states: Vec<_> = self.states.iter().map(|s| s.value().clone()).collect();
        states.sort_by_key(|s| s.id());
        states
    }

    pub fn ids(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.states.iter().map(|s| s.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
