use std::time::Duration;

use super::*;
use crate::FileKey;

#[tokio::test(start_paused = true)]
async fn test_wait_should_time_out_without_trigger() {
    let trigger = ScheduleTrigger::new();
    assert!(!trigger.wait(Duration::from_secs(10)).await);
}

#[tokio::test]
async fn test_trigger_raised_before_wait_should_not_be_lost() {
    let trigger = ScheduleTrigger::new();
    trigger.add_files(vec![FileKey::new("F1", 1)]);

    assert!(trigger.wait(Duration::from_millis(50)).await);
    let batch = trigger.take();
    assert_eq!(batch.files, vec![FileKey::new("F1", 1)]);
    assert!(trigger.take().is_empty());
}

#[test]
fn test_batches_should_accumulate_and_dedup_subscribers() {
    let trigger = ScheduleTrigger::new();
    trigger.add_subscriber("s1");
    trigger.add_subscribers(vec!["s2".to_string(), "s1".to_string()]);
    trigger.add_files(vec![FileKey::new("F1", 1)]);
    trigger.add_files(vec![FileKey::new("F2", 1)]);

    let batch = trigger.take();
    assert_eq!(batch.subscribers.into_iter().collect::<Vec<_>>(), vec!["s1", "s2"]);
    assert_eq!(batch.files.len(), 2);
}

#[test]
fn test_restore_should_merge_back_into_pending() {
    let trigger = ScheduleTrigger::new();
    let mut failed = TriggerBatch::default();
    failed.files.push(FileKey::new("F1", 1));
    trigger.add_subscriber("s1");

    trigger.restore(failed);

    let batch = trigger.take();
    assert_eq!(batch.files, vec![FileKey::new("F1", 1)]);
    assert!(batch.subscribers.contains("s1"));
}
