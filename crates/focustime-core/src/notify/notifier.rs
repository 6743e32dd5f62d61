use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::cue::{CommandCuePlayer, Cue, CuePlayer, SilentCuePlayer};
use crate::events::{CompletionEvent, Event};
use crate::storage::NotificationsConfig;
use crate::timer::Phase;

/// Raised once per completed phase for UI listeners (summary modal, badge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionComplete {
    pub completed_phase: Phase,
    pub next_phase: Phase,
    pub completed_study_count: u32,
    pub skipped: bool,
    pub at: DateTime<Utc>,
}

impl From<&CompletionEvent> for SessionComplete {
    fn from(c: &CompletionEvent) -> Self {
        Self {
            completed_phase: c.completed_phase,
            next_phase: c.next_phase,
            completed_study_count: c.completed_study_count,
            skipped: c.skipped,
            at: c.at,
        }
    }
}

/// Reacts to phase completions with a cue and a UI signal.
///
/// Holds no timer state and cannot fail in a way the engine sees.
pub struct CompletionNotifier {
    player: Box<dyn CuePlayer>,
    signal: broadcast::Sender<SessionComplete>,
}

impl CompletionNotifier {
    pub fn new(player: impl CuePlayer + 'static) -> Self {
        let (signal, _) = broadcast::channel(16);
        Self {
            player: Box::new(player),
            signal,
        }
    }

    pub fn from_config(config: &NotificationsConfig) -> Self {
        match CommandCuePlayer::from_config(config) {
            Some(player) => Self::new(player),
            None => Self::new(SilentCuePlayer),
        }
    }

    /// Subscribe to "session complete" signals.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionComplete> {
        self.signal.subscribe()
    }

    /// Handle one event. Returns the signal raised, if any.
    pub fn handle(&self, event: &Event) -> Option<SessionComplete> {
        let completion = event.as_completion()?;
        let cue = Cue::for_next_phase(completion.next_phase);
        if let Err(e) = self.player.play(cue) {
            tracing::warn!(?cue, "completion cue failed: {e}");
        }
        let signal = SessionComplete::from(completion);
        // No UI listener is fine.
        let _ = self.signal.send(signal.clone());
        Some(signal)
    }

    /// Consume `events` on a background task until the bus closes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, mut events: broadcast::Receiver<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle(&event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "completion notifier fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CueError;
    use crate::events::EventBus;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        played: Arc<Mutex<Vec<Cue>>>,
        fail: bool,
    }

    impl CuePlayer for RecordingPlayer {
        fn play(&self, cue: Cue) -> Result<(), CueError> {
            self.played.lock().unwrap().push(cue);
            if self.fail {
                return Err(CueError::MissingSound("ding.wav".into()));
            }
            Ok(())
        }
    }

    fn completion(completed: Phase, next: Phase) -> Event {
        Event::PhaseCompleted(CompletionEvent {
            completed_phase: completed,
            next_phase: next,
            completed_study_count: 1,
            duration_secs: 1500,
            elapsed_secs: 1500,
            skipped: false,
            at: Utc::now(),
        })
    }

    #[test]
    fn ignores_non_completion_events() {
        let player = RecordingPlayer::default();
        let notifier = CompletionNotifier::new(player.clone());
        let event = Event::TimerReset {
            phase: Phase::Study,
            duration_secs: 1500,
            at: Utc::now(),
        };
        assert!(notifier.handle(&event).is_none());
        assert!(player.played.lock().unwrap().is_empty());
    }

    #[test]
    fn playback_failure_still_signals() {
        let player = RecordingPlayer {
            fail: true,
            ..RecordingPlayer::default()
        };
        let notifier = CompletionNotifier::new(player.clone());
        let mut rx = notifier.subscribe();

        let signal = notifier
            .handle(&completion(Phase::Study, Phase::ShortBreak))
            .unwrap();
        assert_eq!(signal.next_phase, Phase::ShortBreak);
        assert_eq!(rx.try_recv().unwrap(), signal);
        assert_eq!(*player.played.lock().unwrap(), vec![Cue::BreakTime]);
    }

    #[tokio::test]
    async fn spawned_notifier_follows_bus() {
        let bus = EventBus::new();
        let player = RecordingPlayer::default();
        let notifier = CompletionNotifier::new(player.clone());
        let mut signals = notifier.subscribe();
        let task = notifier.spawn(bus.subscribe());

        bus.publish(completion(Phase::LongBreak, Phase::Study));
        let signal = signals.recv().await.unwrap();
        assert_eq!(signal.completed_phase, Phase::LongBreak);
        assert_eq!(*player.played.lock().unwrap(), vec![Cue::BackToStudy]);

        drop(bus);
        task.await.unwrap();
    }
}
