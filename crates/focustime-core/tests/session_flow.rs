//! End-to-end wiring: remote settings feed the driver, completions reach the
//! notifier and the history.

use std::time::Duration;

use chrono::Utc;
use focustime_core::notify::SilentCuePlayer;
use focustime_core::{
    CompletionNotifier, Database, EventBus, HttpSettingsBackend, ManualClock, MemorySlot, Phase,
    ProgressRecorder, SettingsPatch, SettingsStore, SnapshotStore, TimerDriver, TimerEngine,
};

const T0: u64 = 1_750_000_000_000;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_settings_sync_drives_engine_and_history() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/pomodoro-settings")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "s1", "study_time": 40, "short_break": 7, "long_break": 20, "show_timer": true}"#)
        .create_async()
        .await;
    server
        .mock("PUT", "/pomodoro-settings/s1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": "s1", "study_time": 40, "short_break": 9, "long_break": 20, "show_timer": true}"#)
        .create_async()
        .await;

    let backend = HttpSettingsBackend::new(&server.url(), Some("tok".into())).unwrap();
    let settings = SettingsStore::new(backend);

    // Subscribers attach before the engine restores.
    let bus = EventBus::new();
    let notifier = CompletionNotifier::new(SilentCuePlayer);
    let mut signals = notifier.subscribe();
    let notifier_task = notifier.spawn(bus.subscribe());
    let recorder_task = ProgressRecorder::new(Database::open_memory().unwrap()).spawn(bus.subscribe());

    let clock = ManualClock::new(T0);
    let engine = TimerEngine::new(
        settings.current(),
        SnapshotStore::new(MemorySlot::new()),
        clock.clone(),
        bus,
    );
    let driver = TimerDriver::new(
        engine,
        Duration::from_secs(1),
        tokio::runtime::Handle::current(),
    );
    driver.bind_settings(settings.subscribe());
    assert_eq!(driver.engine().total_secs(), 25 * 60);

    settings.load().await.unwrap();
    settle().await;
    assert_eq!(driver.engine().total_secs(), 40 * 60);

    // A full study phase elapses on the wall clock.
    driver.start();
    clock.advance_secs(40 * 60);
    let event = driver.tick_now().expect("study should complete");
    assert_eq!(event.as_completion().unwrap().next_phase, Phase::ShortBreak);
    assert_eq!(driver.engine().total_secs(), 7 * 60);
    assert!(!driver.is_ticking());

    let signal = signals.recv().await.unwrap();
    assert_eq!(signal.completed_phase, Phase::Study);
    assert_eq!(signal.completed_study_count, 1);

    // An edit while idle resizes the pending break.
    settings.save(SettingsPatch::short_break_minutes(9)).await.unwrap();
    settle().await;
    assert_eq!(driver.engine().total_secs(), 9 * 60);

    driver.skip_phase(Phase::ShortBreak);
    // A second tap for the same phase is a no-op.
    assert!(driver.skip_phase(Phase::ShortBreak).is_none());
    assert_eq!(driver.engine().phase(), Phase::Study);

    // Dropping the driver drops the engine and with it the last bus sender.
    drop(driver);
    notifier_task.await.unwrap();
    let db = recorder_task.await.unwrap();

    let stats = db.stats(Utc::now()).unwrap();
    assert_eq!(stats.total_phases, 2);
    assert_eq!(stats.completed_study_phases, 1);
    assert_eq!(stats.skipped_phases, 1);
}
