mod common;

use std::sync::Arc;

use common::*;
use ngas_subscription::FileKey;

#[tokio::test]
async fn test_single_subscriber_receives_new_file() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = archive.engine(fast_config(), transport.clone(), notifier.clone());

    engine.subscribe(request("S", 5)).await.unwrap();
    let f1 = archive.store_file("F1", day(2));
    engine.notify_new_files([f1.clone()]);

    let report = engine.run_cycle_now();
    assert_eq!(report.queued_for("S"), 1);

    eventually(|| engine.outstanding("S") == 0).await;
    assert_eq!(transport.delivered_ids(), vec!["F1".to_string()]);
    assert_eq!(engine.watermarks("S").unwrap().delivered_through, Some(day(2)));
    assert!(engine.backlog_entries("S").unwrap().is_empty());
    assert_eq!(engine.reference_count(&f1), 0);
    assert_eq!(notifier.notified(), vec![(UNIT.to_string(), "F1".to_string(), 1)]);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_delivery_retried_from_backlog_until_accepted() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::default().fail_first("F1", 2));
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = archive.engine(fast_config(), transport.clone(), notifier.clone());

    engine.subscribe(request("S", 1)).await.unwrap();
    archive.store_file("F1", day(2));

    engine.run_cycle_now();
    eventually(|| engine.outstanding("S") == 0).await;
    assert_eq!(engine.backlog_entries("S").unwrap().len(), 1);
    assert_eq!(engine.watermarks("S").unwrap().delivered_through, None);

    // first replay fails again
    assert_eq!(engine.run_cycle_now().queued_for("S"), 1);
    eventually(|| engine.outstanding("S") == 0).await;
    assert_eq!(engine.backlog_entries("S").unwrap().len(), 1);

    assert_eq!(engine.run_cycle_now().queued_for("S"), 1);
    eventually(|| engine.outstanding("S") == 0).await;
    assert!(engine.backlog_entries("S").unwrap().is_empty());
    assert_eq!(transport.attempts().len(), 3);
    assert_eq!(transport.delivered_ids(), vec!["F1".to_string()]);
    assert_eq!(engine.watermarks("S").unwrap().delivered_through, Some(day(2)));
    assert_eq!(notifier.count_for("F1"), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shared_file_released_for_eviction_after_last_subscriber() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::gated());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = archive.engine(fast_config(), transport.clone(), notifier.clone());

    engine.subscribe(request("S1", 1)).await.unwrap();
    engine.subscribe(request("S2", 10)).await.unwrap();
    let f1 = archive.store_file("F1", day(2));

    let report = engine.run_cycle_now();
    assert_eq!(report.total(), 2);
    assert_eq!(engine.reference_count(&f1), 2);

    transport.release(1);
    eventually(|| engine.reference_count(&f1) == 1).await;
    assert!(notifier.notified().is_empty());

    transport.release(1);
    eventually(|| engine.reference_count(&f1) == 0).await;
    eventually(|| notifier.count_for("F1") == 1).await;
    assert_eq!(notifier.notified(), vec![(UNIT.to_string(), "F1".to_string(), 1)]);

    let mut delivered = transport.delivered();
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            ("http://S1.example.org/QARCHIVE".to_string(), "F1".to_string()),
            ("http://S2.example.org/QARCHIVE".to_string(), "F1".to_string()),
        ]
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_files_before_start_date_are_not_offered() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::default());
    let engine = archive.engine(fast_config(), transport.clone(), Arc::new(RecordingNotifier::default()));

    archive.store_file("OLD", day(1) - chrono::Duration::days(1));
    archive.store_file("NEW", day(3));
    engine.subscribe(request("S", 1)).await.unwrap();

    assert_eq!(engine.run_cycle_now().queued_for("S"), 1);
    eventually(|| engine.outstanding("S") == 0).await;
    assert_eq!(transport.delivered_ids(), vec!["NEW".to_string()]);
    assert_eq!(engine.reference_count(&FileKey::new("OLD", 1)), 0);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_already_delivered_file_is_not_offered_again() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::default());
    let engine = archive.engine(fast_config(), transport.clone(), Arc::new(RecordingNotifier::default()));

    engine.subscribe(request("S", 1)).await.unwrap();
    let f1 = archive.store_file("F1", day(2));
    engine.run_cycle_now();
    eventually(|| engine.outstanding("S") == 0).await;

    // announcing it again does not re-deliver
    engine.notify_new_files([f1]);
    assert_eq!(engine.run_cycle_now().queued_for("S"), 0);
    assert_eq!(transport.attempts().len(), 1);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_distinct_files_sharing_an_ingestion_date_are_both_delivered() {
    let archive = TestArchive::new();
    let transport = Arc::new(ScriptedTransport::default());
    let engine = archive.engine(fast_config(), transport.clone(), Arc::new(RecordingNotifier::default()));
    engine.subscribe(request("S", 1)).await.unwrap();

    let f1 = archive.store_file("F1", day(2));
    engine.notify_new_files([f1.clone()]);
    assert_eq!(engine.run_cycle_now().queued_for("S"), 1);
    eventually(|| engine.outstanding("S") == 0).await;

    let f2 = archive.store_file("F2", day(2));
    engine.notify_new_files([f1, f2]);
    assert_eq!(engine.run_cycle_now().queued_for("S"), 1);
    eventually(|| engine.outstanding("S") == 0).await;

    assert_eq!(transport.delivered_ids(), vec!["F1".to_string(), "F2".to_string()]);
    assert_eq!(engine.watermarks("S").unwrap().delivered_through, Some(day(2)));

    engine.shutdown().await.unwrap();
}
