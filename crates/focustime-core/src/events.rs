use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timer::{Phase, TimerState};

/// Every engine state change produces an Event.
/// The UI polls snapshots; notifiers and recorders subscribe to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseCompleted(CompletionEvent),
    /// Idle engine resized its current phase after a settings change.
    SettingsApplied {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        remaining_secs: u64,
        total_secs: u64,
        completed_study_count: u32,
        progress: f64,
        at: DateTime<Utc>,
    },
}

/// A phase ended, either by running out or by being skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub completed_phase: Phase,
    pub next_phase: Phase,
    pub completed_study_count: u32,
    /// Planned length of the phase that ended.
    pub duration_secs: u64,
    /// Time actually counted down before it ended.
    pub elapsed_secs: u64,
    pub skipped: bool,
    pub at: DateTime<Utc>,
}

impl Event {
    pub fn as_completion(&self) -> Option<&CompletionEvent> {
        match self {
            Event::PhaseCompleted(c) => Some(c),
            _ => None,
        }
    }
}

const BUS_CAPACITY: usize = 64;

/// Fan-out channel for engine events.
///
/// Publishing never blocks and never fails; events sent with no subscriber
/// are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_serializes_with_type_tag() {
        let event = Event::PhaseCompleted(CompletionEvent {
            completed_phase: Phase::Study,
            next_phase: Phase::ShortBreak,
            completed_study_count: 1,
            duration_secs: 1500,
            elapsed_secs: 1500,
            skipped: false,
            at: DateTime::from_timestamp(0, 0).unwrap(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PhaseCompleted");
        assert_eq!(json["completed_phase"], "study");
        assert_eq!(json["next_phase"], "shortBreak");
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(Event::TimerReset {
            phase: Phase::Study,
            duration_secs: 60,
            at: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::TimerPaused {
            phase: Phase::ShortBreak,
            remaining_secs: 42,
            at: Utc::now(),
        });
        match rx.recv().await.unwrap() {
            Event::TimerPaused { remaining_secs, .. } => assert_eq!(remaining_secs, 42),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
