//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (usually [`TimerDriver`]) is responsible for
//! calling `tick()` periodically. Elapsed time is always derived from clock
//! deltas, so irregular or suspended ticking never loses or invents time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   ^        |          |
//!   +-- reset / phase completion (expiry or skip)
//! ```
//!
//! The phase (`Study`, `ShortBreak`, `LongBreak`) is orthogonal to the
//! run-state and only changes on completion. A completed phase leaves the
//! engine `Idle` in the next phase; it never starts on its own.
//!
//! [`TimerDriver`]: super::TimerDriver

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::phase::Phase;
use crate::events::{CompletionEvent, Event, EventBus};
use crate::settings::PomodoroSettings;
use crate::storage::{SnapshotStore, TimerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Core timer engine.
///
/// Every state-affecting command persists a [`TimerSnapshot`] and publishes
/// the returned event on the [`EventBus`].
pub struct TimerEngine {
    settings: PomodoroSettings,
    phase: Phase,
    state: TimerState,
    remaining_secs: u64,
    /// Frozen at phase start; only resized while idle.
    total_secs: u64,
    completed_study_count: u32,
    /// Epoch ms up to which elapsed time has been accounted for.
    last_observed_at_ms: u64,
    clock: Arc<dyn Clock>,
    snapshots: SnapshotStore,
    events: EventBus,
}

impl TimerEngine {
    /// Create the engine, resuming whatever session `snapshots` holds.
    ///
    /// A running snapshot is caught up by the wall-clock time that passed
    /// since it was written; if that exhausts the phase, the completion is
    /// published on `events` before this returns. Missing or corrupt data
    /// yields a fresh idle Study phase.
    pub fn new(
        settings: PomodoroSettings,
        snapshots: SnapshotStore,
        clock: impl Clock + 'static,
        events: EventBus,
    ) -> Self {
        let mut engine = Self::fresh(settings, snapshots, Arc::new(clock), events);
        engine.restore();
        engine
    }

    fn fresh(
        settings: PomodoroSettings,
        snapshots: SnapshotStore,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        let total_secs = Phase::Study.duration_secs(&settings);
        let now = clock.now_ms();
        Self {
            settings,
            phase: Phase::Study,
            state: TimerState::Idle,
            remaining_secs: total_secs,
            total_secs,
            completed_study_count: 0,
            last_observed_at_ms: now,
            clock,
            snapshots,
            events,
        }
    }

    fn restore(&mut self) {
        let Some(snap) = self.snapshots.load_or_discard() else {
            tracing::debug!("no persisted timer state, starting idle");
            self.persist();
            return;
        };

        self.phase = snap.current_phase;
        self.completed_study_count = snap.completed_study_count;
        self.total_secs = snap.total_duration_seconds;
        self.remaining_secs = snap.time_remaining_seconds;
        self.last_observed_at_ms = snap.last_observed_at;
        self.state = snap.state();

        match self.state {
            TimerState::Running => {
                let before = self.remaining_secs;
                self.flush_elapsed();
                tracing::info!(
                    phase = %self.phase,
                    caught_up_secs = before - self.remaining_secs,
                    remaining_secs = self.remaining_secs,
                    "resumed running timer"
                );
                if self.remaining_secs == 0 {
                    self.complete(false);
                    return;
                }
            }
            TimerState::Paused => {
                tracing::info!(phase = %self.phase, remaining_secs = self.remaining_secs, "restored paused timer");
            }
            TimerState::Idle => {
                self.resize_idle();
            }
        }
        self.persist();
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn completed_study_count(&self) -> u32 {
        self.completed_study_count
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// 0.0 .. 1.0 progress within the current phase.
    pub fn progress(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        1.0 - (self.remaining_secs as f64 / self.total_secs as f64)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            time_remaining_seconds: self.remaining_secs,
            total_duration_seconds: self.total_secs,
            current_phase: self.phase,
            completed_study_count: self.completed_study_count,
            is_running: self.state != TimerState::Idle,
            is_paused: self.state == TimerState::Paused,
            last_observed_at: self.last_observed_at_ms,
        }
    }

    /// Build a full state snapshot event.
    pub fn state_event(&self) -> Event {
        Event::StateSnapshot {
            state: self.state,
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
            completed_study_count: self.completed_study_count,
            progress: self.progress(),
            at: self.clock.now(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Idle => {
                self.state = TimerState::Running;
                self.last_observed_at_ms = self.clock.now_ms();
                self.persist();
                tracing::debug!(phase = %self.phase, duration_secs = self.total_secs, "timer started");
                self.emit(Event::TimerStarted {
                    phase: self.phase,
                    duration_secs: self.total_secs,
                    remaining_secs: self.remaining_secs,
                    at: self.clock.now(),
                })
            }
            TimerState::Paused => self.resume(),
            TimerState::Running => None, // Already running.
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        // Flush elapsed time first.
        self.flush_elapsed();
        if self.remaining_secs == 0 {
            return Some(self.complete(false));
        }
        self.state = TimerState::Paused;
        self.persist();
        tracing::debug!(phase = %self.phase, remaining_secs = self.remaining_secs, "timer paused");
        self.emit(Event::TimerPaused {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            at: self.clock.now(),
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.state = TimerState::Running;
        // Paused wall-clock time must not count as elapsed.
        self.last_observed_at_ms = self.clock.now_ms();
        self.persist();
        tracing::debug!(phase = %self.phase, remaining_secs = self.remaining_secs, "timer resumed");
        self.emit(Event::TimerResumed {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            at: self.clock.now(),
        })
    }

    /// Back to a full idle phase, sized from the current settings. Idempotent.
    pub fn reset(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.total_secs = self.phase.duration_secs(&self.settings);
        self.remaining_secs = self.total_secs;
        self.last_observed_at_ms = self.clock.now_ms();
        self.persist();
        tracing::debug!(phase = %self.phase, "timer reset");
        self.emit(Event::TimerReset {
            phase: self.phase,
            duration_secs: self.total_secs,
            at: self.clock.now(),
        })
    }

    /// End the current phase now, whatever its remaining time.
    pub fn skip(&mut self) -> Option<Event> {
        if self.state == TimerState::Running {
            self.flush_elapsed();
        }
        Some(self.complete(true))
    }

    /// Skip only if the engine is still in `expected`.
    ///
    /// Hosts wire user-facing skip buttons here so that a duplicated request
    /// for the same phase produces a single transition.
    pub fn skip_phase(&mut self, expected: Phase) -> Option<Event> {
        if self.phase != expected {
            tracing::debug!(expected = %expected, current = %self.phase, "ignoring stale skip");
            return None;
        }
        self.skip()
    }

    /// Call periodically. Returns `Some(Event::PhaseCompleted)` when the phase runs out.
    ///
    /// A tick that arrives while not running (e.g. after pause or reset) does nothing.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        if !self.flush_elapsed() {
            return None;
        }
        if self.remaining_secs == 0 {
            return Some(self.complete(false));
        }
        self.persist();
        None
    }

    /// Take new settings. An idle phase is resized at once; a running or
    /// paused phase keeps its duration until the next boundary.
    pub fn update_settings(&mut self, settings: PomodoroSettings) -> Option<Event> {
        self.settings = settings;
        if self.state != TimerState::Idle {
            tracing::debug!(phase = %self.phase, "settings changed mid-phase, deferring resize");
            return None;
        }
        if !self.resize_idle() {
            return None;
        }
        self.persist();
        self.emit(Event::SettingsApplied {
            phase: self.phase,
            duration_secs: self.total_secs,
            at: self.clock.now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Subtract whole elapsed seconds since the last observation.
    /// Returns whether any time was consumed.
    fn flush_elapsed(&mut self) -> bool {
        let now = self.clock.now_ms();
        if now < self.last_observed_at_ms {
            // Clock went backwards; re-anchor instead of waiting for it to catch up.
            self.last_observed_at_ms = now;
            return false;
        }
        let delta_secs = (now - self.last_observed_at_ms) / 1000;
        if delta_secs == 0 {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(delta_secs);
        // Keep the sub-second remainder for the next tick.
        self.last_observed_at_ms += delta_secs * 1000;
        true
    }

    fn resize_idle(&mut self) -> bool {
        let total = self.phase.duration_secs(&self.settings);
        if total == self.total_secs && self.remaining_secs == total {
            return false;
        }
        self.total_secs = total;
        self.remaining_secs = total;
        true
    }

    fn complete(&mut self, skipped: bool) -> Event {
        let completed = self.phase;
        let duration_secs = self.total_secs;
        let elapsed_secs = self.total_secs - self.remaining_secs;

        self.state = TimerState::Idle;
        if completed == Phase::Study {
            self.completed_study_count += 1;
        }
        let next = completed.next(self.completed_study_count);
        self.phase = next;
        self.total_secs = next.duration_secs(&self.settings);
        self.remaining_secs = self.total_secs;
        self.last_observed_at_ms = self.clock.now_ms();
        self.persist();

        tracing::info!(
            completed = %completed,
            next = %next,
            completed_study_count = self.completed_study_count,
            skipped,
            "phase completed"
        );
        let event = Event::PhaseCompleted(CompletionEvent {
            completed_phase: completed,
            next_phase: next,
            completed_study_count: self.completed_study_count,
            duration_secs,
            elapsed_secs,
            skipped,
            at: self.clock.now(),
        });
        self.events.publish(event.clone());
        event
    }

    fn persist(&self) {
        self.snapshots.save(&self.snapshot(), self.clock.now_ms());
    }

    fn emit(&self, event: Event) -> Option<Event> {
        self.events.publish(event.clone());
        Some(event)
    }
}
