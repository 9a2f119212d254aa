use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::async_task::sleep_or_cancelled;
use super::async_task::spawn_task;
use crate::Error;

#[tokio::test]
async fn test_spawn_task_should_swallow_task_error() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();

    let handle = spawn_task("failing", async move {
        c.fetch_add(1, Ordering::SeqCst);
        Err(Error::Fatal("boom".to_string()))
    });

    assert!(handle.await.is_ok());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_or_cancelled_should_return_true_after_full_sleep() {
    let token = CancellationToken::new();
    assert!(sleep_or_cancelled(Duration::from_secs(3), &token).await);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_or_cancelled_should_stop_early_on_cancel() {
    let token = CancellationToken::new();
    let t = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        t.cancel();
    });

    let started = tokio::time::Instant::now();
    assert!(!sleep_or_cancelled(Duration::from_secs(60), &token).await);
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test]
async fn test_zero_sleep_should_report_cancellation_state() {
    let token = CancellationToken::new();
    assert!(sleep_or_cancelled(Duration::ZERO, &token).await);
    token.cancel();
    assert!(!sleep_or_cancelled(Duration::ZERO, &token).await);
}
