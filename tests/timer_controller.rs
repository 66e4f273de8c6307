mod common;

use std::{sync::atomic::Ordering, sync::Arc, time::Duration};

use common::{advance, settle, RecordingStore};
use conduct_engine::{ColorBand, ConductError, TimerController, TimerKey, TimerStatus};

fn controller(store: &Arc<RecordingStore>) -> TimerController {
    TimerController::new("m1", store.clone(), Duration::from_secs(1))
}

#[tokio::test(start_paused = true)]
async fn overtime_item_closes_its_log_with_the_final_value() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("x");

    timers.init(&key, Some(10)).await;
    timers.start(&key).await.unwrap();
    settle().await;

    for _ in 0..650 {
        timers.tick(&key).await.unwrap();
    }
    let snapshot = timers.pause(&key).await.unwrap();
    timers.drain_log_writes().await;

    assert_eq!(snapshot.status, TimerStatus::Paused);
    assert_eq!(snapshot.elapsed_seconds, 650);
    assert!(snapshot.is_overtime);
    assert_eq!(snapshot.overtime_seconds, Some(50));
    assert_eq!(snapshot.color, ColorBand::Red);
    assert_eq!(snapshot.display, "+0:50");
    assert_eq!(store.opened(), vec![("log-1".to_string(), Some("x".to_string()))]);
    assert_eq!(store.closed(), vec![("log-1".to_string(), 650)]);
}

#[tokio::test(start_paused = true)]
async fn clock_advances_running_timers_once_per_interval() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let item = TimerKey::item("a");
    timers.init(&item, None).await;

    timers.start(&TimerKey::Global).await.unwrap();
    timers.start(&item).await.unwrap();
    timers.start_clock().await;
    assert!(timers.clock_running().await);

    advance(3500).await;
    assert_eq!(timers.elapsed_seconds(&TimerKey::Global).await, Some(3));
    assert_eq!(timers.elapsed_seconds(&item).await, Some(3));

    timers.pause(&item).await.unwrap();
    advance(2000).await;
    assert_eq!(timers.elapsed_seconds(&item).await, Some(3), "paused timers freeze");
    assert_eq!(timers.elapsed_seconds(&TimerKey::Global).await, Some(5));

    timers.stop_clock().await;
    advance(5000).await;
    assert_eq!(timers.elapsed_seconds(&TimerKey::Global).await, Some(5));
    assert!(!timers.clock_running().await);
}

#[tokio::test(start_paused = true)]
async fn first_tick_waits_a_full_interval() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    timers.start(&TimerKey::Global).await.unwrap();
    timers.start_clock().await;

    advance(999).await;
    assert_eq!(timers.elapsed_seconds(&TimerKey::Global).await, Some(0));
    advance(2).await;
    assert_eq!(timers.elapsed_seconds(&TimerKey::Global).await, Some(1));
}

#[tokio::test(start_paused = true)]
async fn global_timer_never_opens_a_log() {
    let store = RecordingStore::new();
    let timers = controller(&store);

    timers.start(&TimerKey::Global).await.unwrap();
    timers.tick(&TimerKey::Global).await.unwrap();
    timers.pause(&TimerKey::Global).await.unwrap();
    timers.drain_log_writes().await;

    assert!(store.opened().is_empty());
    assert!(store.closed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn log_id_arriving_after_pause_is_closed_on_arrival() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, Some(5)).await;

    store.hold_log_opens();
    timers.start(&key).await.unwrap();
    for _ in 0..5 {
        timers.tick(&key).await.unwrap();
    }
    timers.pause(&key).await.unwrap();
    assert!(store.closed().is_empty());

    store.release_log_opens(1);
    timers.drain_log_writes().await;

    assert_eq!(store.closed(), vec![("log-1".to_string(), 5)]);
    let snapshot = timers.snapshot(&key).await.unwrap();
    assert_eq!(snapshot.durable_log_id.as_deref(), Some("log-1"));
}

#[tokio::test(start_paused = true)]
async fn log_id_arriving_after_reset_stays_with_the_old_segment() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, None).await;

    store.hold_log_opens();
    timers.start(&key).await.unwrap();
    for _ in 0..7 {
        timers.tick(&key).await.unwrap();
    }
    let reset = timers.reset(&key).await.unwrap();
    assert_eq!(reset.status, TimerStatus::Idle);
    assert_eq!(reset.elapsed_seconds, 0);

    store.release_log_opens(2);
    timers.drain_log_writes().await;
    assert_eq!(store.closed(), vec![("log-1".to_string(), 7)]);
    assert_eq!(timers.snapshot(&key).await.unwrap().durable_log_id, None);

    timers.start(&key).await.unwrap();
    timers.drain_log_writes().await;
    assert_eq!(
        timers.snapshot(&key).await.unwrap().durable_log_id.as_deref(),
        Some("log-2")
    );
}

#[tokio::test(start_paused = true)]
async fn restarting_before_the_log_opens_keeps_one_log() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, None).await;

    store.hold_log_opens();
    timers.start(&key).await.unwrap();
    timers.tick(&key).await.unwrap();
    timers.pause(&key).await.unwrap();
    timers.start(&key).await.unwrap();
    timers.tick(&key).await.unwrap();

    store.release_log_opens(2);
    settle().await;
    timers.pause(&key).await.unwrap();
    timers.drain_log_writes().await;

    assert_eq!(store.opened().len(), 1);
    assert_eq!(store.closed(), vec![("log-1".to_string(), 2)]);
}

#[tokio::test(start_paused = true)]
async fn log_id_arriving_after_two_resets_closes_the_first_segment() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, None).await;

    store.hold_log_opens();
    timers.start(&key).await.unwrap();
    for _ in 0..7 {
        timers.tick(&key).await.unwrap();
    }
    timers.reset(&key).await.unwrap();
    timers.reset(&key).await.unwrap();

    store.release_log_opens(1);
    timers.drain_log_writes().await;
    assert_eq!(store.closed(), vec![("log-1".to_string(), 7)]);
}

#[tokio::test(start_paused = true)]
async fn resetting_a_running_timer_closes_its_segment() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, Some(1)).await;

    timers.start(&key).await.unwrap();
    settle().await;
    for _ in 0..42 {
        timers.tick(&key).await.unwrap();
    }
    timers.reset(&key).await.unwrap();
    timers.drain_log_writes().await;

    assert_eq!(store.closed(), vec![("log-1".to_string(), 42)]);
}

#[tokio::test(start_paused = true)]
async fn failed_log_open_keeps_time_in_memory() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");
    timers.init(&key, Some(2)).await;

    store.fail_log_opens.store(true, Ordering::SeqCst);
    timers.start(&key).await.unwrap();
    settle().await;
    for _ in 0..9 {
        timers.tick(&key).await.unwrap();
    }
    let snapshot = timers.pause(&key).await.unwrap();
    timers.drain_log_writes().await;

    assert_eq!(snapshot.elapsed_seconds, 9);
    assert_eq!(snapshot.durable_log_id, None);
    assert!(store.closed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn repeated_start_and_init_keep_progress() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let key = TimerKey::item("a");

    assert!(timers.init(&key, Some(3)).await);
    timers.start(&key).await.unwrap();
    timers.tick(&key).await.unwrap();
    timers.start(&key).await.unwrap();
    assert!(!timers.init(&key, Some(99)).await);
    timers.drain_log_writes().await;

    let snapshot = timers.snapshot(&key).await.unwrap();
    assert_eq!(snapshot.status, TimerStatus::Running);
    assert_eq!(snapshot.elapsed_seconds, 1);
    assert_eq!(snapshot.allocated_seconds, Some(180));
    assert_eq!(store.opened().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn uninitialised_timer_is_rejected() {
    let store = RecordingStore::new();
    let timers = controller(&store);

    let err = timers.start(&TimerKey::item("ghost")).await.unwrap_err();
    assert!(matches!(err, ConductError::TimerNotInitialized(key) if key == "item:ghost"));
}

#[tokio::test(start_paused = true)]
async fn pause_all_commits_every_running_log() {
    let store = RecordingStore::new();
    let timers = controller(&store);
    let (a, b) = (TimerKey::item("a"), TimerKey::item("b"));
    timers.init(&a, None).await;
    timers.init(&b, None).await;

    timers.start(&a).await.unwrap();
    timers.start(&b).await.unwrap();
    timers.start(&TimerKey::Global).await.unwrap();
    settle().await;
    timers.tick_running().await;

    assert_eq!(timers.pause_all().await, 3);
    timers.drain_log_writes().await;

    let mut closed = store.closed();
    closed.sort();
    assert_eq!(closed.len(), 2);
    assert!(closed.iter().all(|(_, elapsed)| *elapsed == 1));
    assert!(timers.running_items().await.is_empty());
}
