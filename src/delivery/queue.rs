use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::QueueEntry;

/// In-memory FIFO of one subscriber, drained by its worker pool.
///
/// Popping moves the entry into the in-flight count until `finish` is called,
/// so `outstanding` never drops to zero while an attempt is running.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    in_flight: AtomicUsize,
    notify: Notify,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        entry: QueueEntry,
    ) {
        self.entries.lock().push_back(entry);
        self.notify.notify_one();
    }

    pub fn push_all(
        &self,
        entries: impl IntoIterator<Item = QueueEntry>,
    ) -> usize {
        let pushed = {
            let mut queue = self.entries.lock();
            let before = queue.len();
            queue.extend(entries);
            queue.len() - before
        };
        if pushed > 0 {
            self.notify.notify_one();
        }
        pushed
    }

    /// Waits up to `timeout` for an entry.
    pub async fn pop(
        &self,
        timeout: Duration,
    ) -> Option<QueueEntry> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return self.try_pop();
            }
        }
    }

    pub fn try_pop(&self) -> Option<QueueEntry> {
        let mut queue = self.entries.lock();
        let entry = queue.pop_front()?;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if !queue.is_empty() {
            // hand the wake-up on to the next idle worker
            self.notify.notify_one();
        }
        Some(entry)
    }

    /// Marks one popped entry as resolved.
    pub fn finish(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Removes every queued (not in-flight) entry.
    pub fn drain(&self) -> Vec<QueueEntry> {
        self.entries.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queued plus in-flight entries.
    pub fn outstanding(&self) -> usize {
        self.len() + self.in_flight()
    }
}
