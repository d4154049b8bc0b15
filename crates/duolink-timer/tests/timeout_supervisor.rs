//! Integration tests for the timeout supervisor.
//!
//! Uses `start_paused = true` so Tokio's clock auto-advances whenever the
//! runtime is idle: a ten-minute timeout resolves instantly, and ordering
//! between timers is still exact.

use std::time::Duration;

use duolink_timer::{TimeoutSupervisor, TimerId};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Schedules a timeout whose action reports `(key, id)` on a channel.
fn schedule_reporting(
    timers: &mut TimeoutSupervisor<String>,
    key: &str,
    delay: Duration,
    tx: &mpsc::UnboundedSender<(String, TimerId)>,
) -> duolink_timer::TimeoutHandle<String> {
    let tx = tx.clone();
    timers.schedule(key.to_string(), delay, move |key, id| {
        let _ = tx.send((key, id));
    })
}

#[tokio::test(start_paused = true)]
async fn test_fires_once_after_delay() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let start = Instant::now();

    let handle =
        schedule_reporting(&mut timers, "ABCD", Duration::from_secs(600), &tx);

    let (key, id) = rx.recv().await.expect("timeout should fire");
    assert_eq!(key, "ABCD");
    assert_eq!(id, handle.id());
    assert!(start.elapsed() >= Duration::from_secs(600));
    assert!(handle.is_finished());

    // Exactly once.
    drop(tx);
    assert!(rx.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_does_not_fire_early() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _handle =
        schedule_reporting(&mut timers, "R", Duration::from_secs(60), &tx);

    let early = time::timeout(Duration::from_secs(59), rx.recv()).await;
    assert!(early.is_err(), "nothing should fire before the delay");

    let late = time::timeout(Duration::from_secs(2), rx.recv()).await;
    assert!(matches!(late, Ok(Some(_))));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_fire_prevents_action() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle =
        schedule_reporting(&mut timers, "R", Duration::from_secs(10), &tx);
    drop(tx);

    assert!(timers.cancel(handle));

    // The aborted task drops its sender, so the channel just closes.
    let result = time::timeout(Duration::from_secs(60), rx.recv()).await;
    assert!(!matches!(result, Ok(Some(_))), "cancelled timeout fired");
    assert_eq!(timers.metrics().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_fire_is_noop() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle =
        schedule_reporting(&mut timers, "R", Duration::from_millis(5), &tx);
    rx.recv().await.expect("should fire");

    assert!(!timers.cancel(handle));
    assert_eq!(timers.metrics().cancelled, 0);
    assert_eq!(timers.metrics().scheduled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_independent_keys_fire_in_delay_order() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _slow = schedule_reporting(&mut timers, "slow", Duration::from_secs(30), &tx);
    let _fast = schedule_reporting(&mut timers, "fast", Duration::from_secs(10), &tx);

    assert_eq!(rx.recv().await.unwrap().0, "fast");
    assert_eq!(rx.recv().await.unwrap().0, "slow");
}

#[tokio::test(start_paused = true)]
async fn test_reschedule_after_cancel_only_new_timer_fires() {
    let mut timers = TimeoutSupervisor::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let first = schedule_reporting(&mut timers, "R", Duration::from_secs(10), &tx);
    timers.cancel(first);
    let second = schedule_reporting(&mut timers, "R", Duration::from_secs(20), &tx);

    let (_, id) = rx.recv().await.unwrap();
    assert_eq!(id, second.id());
    assert_eq!(timers.metrics().scheduled, 2);
}
