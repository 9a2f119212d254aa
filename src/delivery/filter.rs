use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::CacheReferenceTracker;
use super::SubscriberState;
use crate::CandidateFile;
use crate::PredicateContext;
use crate::PredicateRegistry;

/// Why a candidate was accepted or turned away for one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    /// Subscriber was unsubscribed while the cycle ran
    Removed,
    Suspended,
    /// Back-log replay already queued or in flight
    AlreadyScheduled,
    BeforeStartDate,
    /// Ingested before the subscriber's watermark, or already accepted at it
    AlreadyCovered,
    PredicateRejected,
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Decides whether a subscriber still needs a candidate.
///
/// Acceptance has side effects: a back-log replay is marked scheduled, and a
/// fresh file gains a cache reference for the subscriber.
#[derive(Debug)]
pub struct DeliveryNeedFilter {
    predicates: Arc<PredicateRegistry>,
    tracker: Arc<CacheReferenceTracker>,
}

impl DeliveryNeedFilter {
    pub fn new(
        predicates: Arc<PredicateRegistry>,
        tracker: Arc<CacheReferenceTracker>,
    ) -> Self {
        Self { predicates, tracker }
    }

    pub fn should_deliver(
        &self,
        state: &SubscriberState,
        file: &CandidateFile,
    ) -> bool {
        self.evaluate(state, file).is_accept()
    }

    pub fn evaluate(
        &self,
        state: &SubscriberState,
        file: &CandidateFile,
    ) -> FilterDecision {
        if state.is_removed() {
            return FilterDecision::Removed;
        }
        let subscriber = state.subscriber();
        if subscriber.suspended {
            return FilterDecision::Suspended;
        }

        if file.backlogged {
            // replays skip the date and predicate checks
            if !state.mark_backlog_scheduled(file.key()) {
                return FilterDecision::AlreadyScheduled;
            }
            return FilterDecision::Accept;
        }

        if let Some(start) = subscriber.start_date {
            if file.ingestion_date < start {
                return FilterDecision::BeforeStartDate;
            }
        }

        // distinct files may share the watermark's ingestion date
        if let Some(last) = state.watermarks().effective_last() {
            if file.ingestion_date < last
                || (file.ingestion_date == last && state.accepted_at(&file.key(), last))
            {
                return FilterDecision::AlreadyCovered;
            }
        }

        if let Some(spec) = &subscriber.filter {
            let Some(predicate) = self.predicates.get(&spec.name) else {
                warn!(
                    subscriber_id = %subscriber.id,
                    predicate = %spec.name,
                    "filter predicate not registered, rejecting file"
                );
                return FilterDecision::PredicateRejected;
            };
            let ctx = PredicateContext {
                params: &spec.params,
                file_path: &file.file_name,
                file_id: &file.file_id,
                file_version: file.version,
                mime_type: &file.mime_type,
            };
            match predicate.evaluate(&ctx) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(subscriber_id = %subscriber.id, file = %file.key(), "rejected by filter predicate");
                    return FilterDecision::PredicateRejected;
                }
                Err(e) => {
                    warn!(
                        subscriber_id = %subscriber.id,
                        file = %file.key(),
                        predicate = %spec.name,
                        "filter predicate failed, rejecting file: {:?}",
                        e
                    );
                    return FilterDecision::PredicateRejected;
                }
            }
        }

        state.note_accepted(file.key(), file.ingestion_date);
        self.tracker.increment(file, &subscriber.id);
        FilterDecision::Accept
    }
}
