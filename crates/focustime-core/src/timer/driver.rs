//! Tick scheduling for a shared [`TimerEngine`].
//!
//! The engine never schedules itself. The driver owns the one repeating tick
//! task and aborts it before any pause, reset or skip touches the engine, so
//! a stale schedule cannot outlive the phase it was started for. Ticks that
//! still slip through find the engine not running and do nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::TimerEngine;
use super::phase::Phase;
use crate::events::Event;
use crate::settings::PomodoroSettings;

pub type SharedEngine = Arc<Mutex<TimerEngine>>;

pub struct TimerDriver {
    engine: SharedEngine,
    period: Duration,
    runtime: Handle,
    ticker: Mutex<Option<JoinHandle<()>>>,
    settings_task: Mutex<Option<JoinHandle<()>>>,
}

impl TimerDriver {
    /// Take ownership of `engine`. If it was restored in the running state,
    /// ticking resumes right away.
    pub fn new(engine: TimerEngine, period: Duration, runtime: Handle) -> Self {
        let driver = Self {
            engine: Arc::new(Mutex::new(engine)),
            period,
            runtime,
            ticker: Mutex::new(None),
            settings_task: Mutex::new(None),
        };
        if driver.engine().is_running() {
            driver.spawn_ticker();
        }
        driver
    }

    /// Lock the engine for queries. Do not hold the guard across an await.
    pub fn engine(&self) -> MutexGuard<'_, TimerEngine> {
        lock(&self.engine)
    }

    pub fn shared(&self) -> SharedEngine {
        Arc::clone(&self.engine)
    }

    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start(&self) -> Option<Event> {
        let mut engine = self.engine();
        let event = engine.start();
        if engine.is_running() {
            self.spawn_ticker();
        }
        event
    }

    pub fn resume(&self) -> Option<Event> {
        let mut engine = self.engine();
        let event = engine.resume();
        if engine.is_running() {
            self.spawn_ticker();
        }
        event
    }

    pub fn pause(&self) -> Option<Event> {
        let mut engine = self.engine();
        self.cancel_ticker();
        engine.pause()
    }

    pub fn reset(&self) -> Option<Event> {
        let mut engine = self.engine();
        self.cancel_ticker();
        engine.reset()
    }

    pub fn skip(&self) -> Option<Event> {
        let mut engine = self.engine();
        self.cancel_ticker();
        engine.skip()
    }

    pub fn skip_phase(&self, expected: Phase) -> Option<Event> {
        let mut engine = self.engine();
        if engine.phase() != expected {
            return None;
        }
        self.cancel_ticker();
        engine.skip_phase(expected)
    }

    /// Tick outside the schedule, e.g. when the host regains focus.
    pub fn tick_now(&self) -> Option<Event> {
        let mut engine = self.engine();
        let event = engine.tick();
        if event.is_some() {
            self.cancel_ticker();
        }
        event
    }

    pub fn update_settings(&self, settings: PomodoroSettings) -> Option<Event> {
        self.engine().update_settings(settings)
    }

    /// Forward every settings change from `rx` to the engine, starting with
    /// the current value.
    pub fn bind_settings(&self, mut rx: watch::Receiver<PomodoroSettings>) {
        let current = *rx.borrow_and_update();
        self.engine().update_settings(current);

        let engine = Arc::clone(&self.engine);
        let task = self.runtime.spawn(async move {
            while rx.changed().await.is_ok() {
                let settings = *rx.borrow_and_update();
                lock(&engine).update_settings(settings);
            }
            tracing::debug!("settings feed closed");
        });
        if let Some(old) = lock(&self.settings_task).replace(task) {
            old.abort();
        }
    }

    fn spawn_ticker(&self) {
        let engine = Arc::clone(&self.engine);
        let period = self.period;
        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut guard = lock(&engine);
                if guard.tick().is_some() || !guard.is_running() {
                    break;
                }
            }
        });
        if let Some(old) = lock(&self.ticker).replace(task) {
            old.abort();
        }
    }

    fn cancel_ticker(&self) {
        if let Some(task) = lock(&self.ticker).take() {
            task.abort();
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.cancel_ticker();
        if let Some(task) = lock(&self.settings_task).take() {
            task.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::storage::{MemorySlot, SnapshotStore};
    use crate::timer::{ManualClock, TimerState};

    fn driver(clock: &ManualClock, bus: &EventBus) -> TimerDriver {
        let engine = TimerEngine::new(
            PomodoroSettings::default(),
            SnapshotStore::new(MemorySlot::new()),
            clock.clone(),
            bus.clone(),
        );
        TimerDriver::new(engine, Duration::from_secs(1), Handle::current())
    }

    #[tokio::test(start_paused = true)]
    async fn start_spawns_and_pause_cancels() {
        let clock = ManualClock::new(0);
        let bus = EventBus::new();
        let driver = driver(&clock, &bus);

        assert!(!driver.is_ticking());
        driver.start();
        assert!(driver.is_ticking());

        driver.pause();
        assert!(!driver.is_ticking());
        assert_eq!(driver.engine().state(), TimerState::Paused);

        driver.resume();
        assert!(driver.is_ticking());
        driver.reset();
        assert!(!driver.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_engine_to_completion() {
        let clock = ManualClock::new(0);
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let driver = driver(&clock, &bus);

        driver.start();
        clock.advance_secs(1500);

        let completion = loop {
            match rx.recv().await.unwrap() {
                Event::PhaseCompleted(c) => break c,
                _ => continue,
            }
        };
        assert_eq!(completion.completed_phase, Phase::Study);
        assert_eq!(completion.next_phase, Phase::ShortBreak);

        tokio::task::yield_now().await;
        assert!(!driver.is_ticking());
        assert_eq!(driver.engine().state(), TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn bound_settings_reach_idle_engine() {
        let clock = ManualClock::new(0);
        let bus = EventBus::new();
        let driver = driver(&clock, &bus);
        let (tx, rx) = watch::channel(PomodoroSettings::default());
        driver.bind_settings(rx);

        tx.send_replace(PomodoroSettings {
            study_minutes: 45,
            ..PomodoroSettings::default()
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
            if driver.engine().total_secs() == 2700 {
                break;
            }
        }
        assert_eq!(driver.engine().total_secs(), 2700);
    }
}
