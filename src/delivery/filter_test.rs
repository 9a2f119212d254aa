use std::sync::Arc;

use super::*;
use crate::test_utils::backlogged;
use crate::test_utils::candidate;
use crate::test_utils::day;
use crate::test_utils::subscriber;
use crate::FilterSpec;
use crate::PredicateContext;
use crate::PredicateRegistry;
use crate::SystemError;
use crate::Watermarks;

fn filter_with(predicates: PredicateRegistry) -> (DeliveryNeedFilter, Arc<CacheReferenceTracker>) {
    let tracker = Arc::new(CacheReferenceTracker::new(true, None));
    (
        DeliveryNeedFilter::new(Arc::new(predicates), tracker.clone()),
        tracker,
    )
}

fn state(
    sub: crate::Subscriber,
    delivered: Option<chrono::DateTime<chrono::Utc>>,
    scheduled: Option<chrono::DateTime<chrono::Utc>>,
) -> SubscriberState {
    SubscriberState::new(sub, Watermarks::new(delivered, scheduled))
}

#[test]
fn test_accepts_everything_without_watermarks_or_start_date() {
    let (filter, tracker) = filter_with(PredicateRegistry::new());
    let s = state(subscriber("s1", 1), None, None);
    let f = candidate("F1", 1, day(1));

    assert_eq!(filter.evaluate(&s, &f), FilterDecision::Accept);
    assert_eq!(tracker.count(&f.key()), 1);
}

#[test]
fn test_rejects_files_before_start_date() {
    let (filter, tracker) = filter_with(PredicateRegistry::new());
    let s = state(subscriber("s1", 1).with_start_date(Some(day(5))), None, None);

    assert_eq!(
        filter.evaluate(&s, &candidate("F1", 1, day(4))),
        FilterDecision::BeforeStartDate
    );
    assert!(filter.should_deliver(&s, &candidate("F2", 1, day(5))));
    assert_eq!(tracker.count(&candidate("F1", 1, day(4)).key()), 0);
}

#[test]
fn test_rejects_files_older_than_the_later_watermark() {
    let (filter, _) = filter_with(PredicateRegistry::new());
    let s = state(subscriber("s1", 1), Some(day(3)), Some(day(6)));

    assert_eq!(
        filter.evaluate(&s, &candidate("F1", 1, day(5))),
        FilterDecision::AlreadyCovered
    );
    assert!(filter.should_deliver(&s, &candidate("F3", 1, day(7))));
}

#[test]
fn test_distinct_files_at_the_watermark_date_are_each_accepted_once() {
    let (filter, tracker) = filter_with(PredicateRegistry::new());
    let s = state(subscriber("s1", 1), None, None);
    let first = candidate("F1", 1, day(2));
    let second = candidate("F2", 1, day(2));

    assert!(filter.should_deliver(&s, &first));
    s.advance_scheduled(day(2));

    assert_eq!(filter.evaluate(&s, &second), FilterDecision::Accept);
    assert_eq!(filter.evaluate(&s, &first), FilterDecision::AlreadyCovered);
    assert_eq!(filter.evaluate(&s, &second), FilterDecision::AlreadyCovered);
    assert_eq!(tracker.count(&second.key()), 1);

    // a newer acceptance moves the boundary on
    assert!(filter.should_deliver(&s, &candidate("F3", 1, day(3))));
    s.advance_scheduled(day(3));
    assert_eq!(filter.evaluate(&s, &second), FilterDecision::AlreadyCovered);
}

#[test]
fn test_removed_subscriber_takes_no_reference() {
    let (filter, tracker) = filter_with(PredicateRegistry::new());
    let s = state(subscriber("s1", 1), None, None);
    s.mark_removed();
    let f = candidate("F1", 1, day(1));

    assert_eq!(filter.evaluate(&s, &f), FilterDecision::Removed);
    assert_eq!(tracker.count(&f.key()), 0);
}

#[test]
fn test_rejects_everything_while_suspended() {
    let (filter, _) = filter_with(PredicateRegistry::new());
    let mut sub = subscriber("s1", 1);
    sub.suspended = true;
    let s = state(sub, None, None);

    assert_eq!(
        filter.evaluate(&s, &candidate("F1", 1, day(1))),
        FilterDecision::Suspended
    );
    assert_eq!(
        filter.evaluate(&s, &backlogged(candidate("F2", 1, day(1)))),
        FilterDecision::Suspended
    );
}

#[test]
fn test_backlog_replays_bypass_dates_but_are_scheduled_once() {
    let (filter, tracker) = filter_with(PredicateRegistry::new());
    let s = state(
        subscriber("s1", 1).with_start_date(Some(day(10))),
        Some(day(20)),
        Some(day(20)),
    );
    let replay = backlogged(candidate("F1", 1, day(2)));

    assert_eq!(filter.evaluate(&s, &replay), FilterDecision::Accept);
    assert_eq!(filter.evaluate(&s, &replay), FilterDecision::AlreadyScheduled);
    // replays keep the reference taken when first scheduled
    assert_eq!(tracker.count(&replay.key()), 0);

    s.unmark_backlog_scheduled(&replay.key());
    assert!(filter.should_deliver(&s, &replay));
}

#[test]
fn test_predicate_decides_between_accept_and_reject() {
    let (filter, _) = filter_with(PredicateRegistry::with_builtins());
    let s = state(
        subscriber("s1", 1).with_filter(Some(FilterSpec::new("mime_type", "image/x-fits"))),
        None,
        None,
    );
    let mut other = candidate("F2", 1, day(1));
    other.mime_type = "text/plain".to_string();

    assert!(filter.should_deliver(&s, &candidate("F1", 1, day(1))));
    assert_eq!(filter.evaluate(&s, &other), FilterDecision::PredicateRejected);
}

#[test]
fn test_failing_or_unknown_predicate_rejects() {
    let mut predicates = PredicateRegistry::new();
    predicates.register(
        "broken",
        |_: &PredicateContext<'_>| -> crate::Result<bool> {
            Err(SystemError::Serialization("bad params".to_string()).into())
        },
    );
    let (filter, tracker) = filter_with(predicates);
    let f = candidate("F1", 1, day(1));

    let broken = state(
        subscriber("s1", 1).with_filter(Some(FilterSpec::new("broken", ""))),
        None,
        None,
    );
    let unknown = state(
        subscriber("s2", 1).with_filter(Some(FilterSpec::new("missing", ""))),
        None,
        None,
    );

    assert_eq!(filter.evaluate(&broken, &f), FilterDecision::PredicateRejected);
    assert_eq!(filter.evaluate(&unknown, &f), FilterDecision::PredicateRejected);
    assert_eq!(tracker.count(&f.key()), 0);
}
