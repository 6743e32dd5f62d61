use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::DatabaseError;
use crate::events::Event;
use crate::storage::Database;

/// Writes every completed phase into the local history.
pub struct ProgressRecorder {
    db: Database,
}

impl ProgressRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Record `event` if it is a completion. Returns the new row id.
    pub fn record(&self, event: &Event) -> Result<Option<i64>, DatabaseError> {
        match event.as_completion() {
            Some(completion) => self.db.record_phase(completion).map(Some),
            None => Ok(None),
        }
    }

    /// Record completions from `events` until the bus closes, then hand the
    /// database back.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, mut events: broadcast::Receiver<Event>) -> JoinHandle<Database> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(e) = self.record(&event) {
                            tracing::warn!("failed to record phase history: {e}");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "progress recorder fell behind, history has gaps");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            self.db
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CompletionEvent, EventBus};
    use crate::timer::Phase;
    use chrono::Utc;

    #[tokio::test]
    async fn records_only_completions() {
        let bus = EventBus::new();
        let recorder = ProgressRecorder::new(Database::open_memory().unwrap());
        let task = recorder.spawn(bus.subscribe());

        bus.publish(Event::TimerStarted {
            phase: Phase::Study,
            duration_secs: 1500,
            remaining_secs: 1500,
            at: Utc::now(),
        });
        bus.publish(Event::PhaseCompleted(CompletionEvent {
            completed_phase: Phase::Study,
            next_phase: Phase::ShortBreak,
            completed_study_count: 1,
            duration_secs: 1500,
            elapsed_secs: 1500,
            skipped: false,
            at: Utc::now(),
        }));
        drop(bus);

        let db = task.await.unwrap();
        let recent = db.recent_phases(10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].phase, Phase::Study);
        assert_eq!(db.stats(Utc::now()).unwrap().completed_study_phases, 1);
    }
}
