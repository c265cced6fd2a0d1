mod common;

use std::{sync::Arc, time::Duration};

use common::RecordingNotifier;
use interval_timer::{
    clock::{Clock, ManualClock, SystemClock},
    config::EngineConfig,
    engine::{spawn_engine, TimerHandle},
    error::TimerError,
    services::{FileStore, MemoryStore},
    state::{SessionStatus, TimerEvent},
};
use tokio::{sync::broadcast, time::sleep};

fn test_config() -> EngineConfig {
    EngineConfig {
        frames_per_second: 10,
        ..EngineConfig::default()
    }
}

fn engine_with(clock: Arc<dyn Clock>) -> (TimerHandle, Arc<RecordingNotifier>, Arc<MemoryStore>) {
    let notifications = Arc::new(RecordingNotifier::new());
    let store = Arc::new(MemoryStore::new());
    let handle = spawn_engine(test_config(), clock, notifications.clone(), store.clone());
    (handle, notifications, store)
}

fn engine() -> (TimerHandle, Arc<RecordingNotifier>, Arc<MemoryStore>) {
    engine_with(Arc::new(SystemClock::new()))
}

fn drain(events: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn boundary_indexes(events: &[TimerEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            TimerEvent::BoundaryReached { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn fresh_session_reports_full_duration() {
    let (timer, _, _) = engine();

    let snapshot = timer.start(30).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.remaining_ms, 1_800_000);
    assert_eq!(timer.snapshot().remaining_ms, 1_800_000);
}

#[tokio::test(start_paused = true)]
async fn invalid_duration_leaves_engine_idle() {
    let (timer, notifications, _) = engine();

    assert_eq!(
        timer.start(121).await,
        Err(TimerError::InvalidDuration {
            minutes: 121,
            min: 5,
            max: 120
        })
    );
    assert_eq!(timer.snapshot().status, SessionStatus::Idle);
    assert!(notifications.delivered().is_empty());
}

#[tokio::test(start_paused = true)]
async fn full_session_notifies_every_boundary_once() {
    let (timer, notifications, _) = engine();
    let mut events = timer.subscribe();

    timer.start(30).await.unwrap();
    sleep(Duration::from_secs(1_801)).await;

    let snapshot = timer.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.remaining_ms, 0);
    assert_eq!(snapshot.elapsed_seconds, 1_800);

    let events = drain(&mut events);
    assert_eq!(boundary_indexes(&events), (1..=9).collect::<Vec<_>>());
    assert_eq!(events.first(), Some(&TimerEvent::SessionStarted { duration_ms: 1_800_000 }));
    assert_eq!(events.last(), Some(&TimerEvent::SessionCompleted { duration_ms: 1_800_000 }));

    assert_eq!(notifications.titles().len(), 11);
    assert_eq!(timer.frame().label, "00:00");
}

#[tokio::test(start_paused = true)]
async fn ticks_publish_progress() {
    let (timer, _, _) = engine();
    timer.start(5).await.unwrap();

    sleep(Duration::from_millis(5_500)).await;
    let report = *timer.ticks().borrow();
    assert_eq!(report.elapsed_seconds, 5);
    assert_eq!(report.remaining_ms, 295_000);
}

#[tokio::test(start_paused = true)]
async fn paused_session_stays_frozen() {
    let (timer, _, _) = engine();
    timer.start(10).await.unwrap();

    sleep(Duration::from_secs(65)).await;
    let paused = timer.pause().await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);
    assert_eq!(paused.elapsed_seconds, 65);

    sleep(Duration::from_secs(1)).await;
    let first = timer.frame();
    for _ in 0..5 {
        sleep(Duration::from_millis(370)).await;
        assert_eq!(timer.frame(), first);
    }
    assert_eq!(first.status, SessionStatus::Paused);
    assert!((65_000..65_200).contains(&first.live_ms));

    // well past the original deadline: nothing may tick while paused
    sleep(Duration::from_secs(900)).await;
    let snapshot = timer.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Paused);
    assert_eq!(snapshot.elapsed_seconds, 65);

    timer.resume().await.unwrap();
    sleep(Duration::from_secs(534)).await;
    assert_eq!(timer.snapshot().status, SessionStatus::Running);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(timer.snapshot().status, SessionStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_are_idempotent() {
    let (timer, _, _) = engine();
    timer.start(10).await.unwrap();
    sleep(Duration::from_secs(10)).await;

    let once = timer.pause().await.unwrap();
    let twice = timer.pause().await.unwrap();
    assert_eq!(once, twice);

    timer.resume().await.unwrap();
    timer.resume().await.unwrap();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(timer.snapshot().elapsed_seconds, 15);
}

#[tokio::test(start_paused = true)]
async fn ending_stops_all_activity() {
    let (timer, notifications, _) = engine();
    let mut events = timer.subscribe();

    timer.start(5).await.unwrap();
    sleep(Duration::from_secs(200)).await;
    let ended = timer.end().await.unwrap();
    assert_eq!(ended.status, SessionStatus::Idle);

    sleep(Duration::from_secs(1_000)).await;
    let events = drain(&mut events);
    assert!(matches!(events.last(), Some(TimerEvent::SessionEnded { .. })));
    assert_eq!(notifications.cancelled().len(), 2);
    assert_eq!(timer.snapshot().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn suspension_catches_up_in_one_tick() {
    let clock = Arc::new(ManualClock::new(0, 0));
    let (timer, notifications, _) = engine_with(clock.clone());
    let mut events = timer.subscribe();

    timer.start(30).await.unwrap();

    // the process sleeps through 400 seconds of real time
    clock.advance(400_000);
    sleep(Duration::from_millis(1_100)).await;

    let events_now = drain(&mut events);
    assert_eq!(boundary_indexes(&events_now), vec![1, 2]);
    assert_eq!(
        notifications.titles(),
        vec!["Session started", "Nice start", "First interval halfway"]
    );

    clock.advance(1_400_000);
    sleep(Duration::from_millis(1_100)).await;

    let snapshot = timer.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Completed);
    assert_eq!(snapshot.remaining_ms, 0);

    let rest = drain(&mut events);
    assert_eq!(boundary_indexes(&rest), (3..=9).collect::<Vec<_>>());
    let completions = rest
        .iter()
        .filter(|e| matches!(e, TimerEvent::SessionCompleted { .. }))
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test(start_paused = true)]
async fn acknowledge_returns_to_idle_and_allows_restart() {
    let (timer, _, _) = engine();
    timer.start(5).await.unwrap();
    sleep(Duration::from_secs(301)).await;

    assert_eq!(timer.start(5).await, Err(TimerError::SessionInProgress(SessionStatus::Completed)));
    let acknowledged = timer.acknowledge().await.unwrap();
    assert_eq!(acknowledged.status, SessionStatus::Idle);
    assert!(timer.start(5).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn session_survives_engine_restart() {
    let clock = Arc::new(ManualClock::new(0, 1_700_000_000_000));
    let (timer, _, store) = engine_with(clock.clone());

    timer.start(30).await.unwrap();
    clock.advance(100_000);
    timer.shutdown().await;
    assert_eq!(timer.start(30).await, Err(TimerError::EngineStopped));

    // the process was down for another 20 seconds
    clock.advance(20_000);
    let restored = spawn_engine(
        test_config(),
        clock,
        Arc::new(RecordingNotifier::new()),
        store,
    );
    let snapshot = restored.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.elapsed_seconds, 120);
}

#[tokio::test(start_paused = true)]
async fn shutdown_leaves_session_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timer.json");
    let clock = Arc::new(ManualClock::new(0, 1_700_000_000_000));

    let timer = spawn_engine(
        test_config(),
        clock.clone(),
        Arc::new(RecordingNotifier::new()),
        Arc::new(FileStore::open(&path)),
    );
    timer.start(10).await.unwrap();
    clock.advance(30_000);
    timer.pause().await.unwrap();
    timer.shutdown().await;

    let restored = spawn_engine(
        test_config(),
        clock,
        Arc::new(RecordingNotifier::new()),
        Arc::new(FileStore::open(&path)),
    );
    let snapshot = restored.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Paused);
    assert_eq!(snapshot.elapsed_seconds, 30);
}
