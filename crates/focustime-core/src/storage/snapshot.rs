//! Local persistence of the engine's runtime state.
//!
//! One JSON object under a fixed key. There is no versioning: anything that
//! does not match the current shape exactly is treated as corrupt and thrown
//! away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::timer::{Phase, TimerState};

pub const SNAPSHOT_KEY: &str = "focustime.timer_snapshot";

/// Complete runtime state of the timer at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_remaining_seconds: u64,
    pub total_duration_seconds: u64,
    pub current_phase: Phase,
    pub completed_study_count: u32,
    pub is_running: bool,
    pub is_paused: bool,
    /// Epoch milliseconds of the last elapsed-time accounting.
    pub last_observed_at: u64,
}

impl TimerSnapshot {
    /// Run-state implied by the two flags. Paused without running counts as idle.
    pub fn state(&self) -> TimerState {
        match (self.is_running, self.is_paused) {
            (true, false) => TimerState::Running,
            (true, true) => TimerState::Paused,
            (false, _) => TimerState::Idle,
        }
    }

    pub fn check(&self) -> Result<(), SnapshotError> {
        if self.total_duration_seconds == 0 {
            return Err(SnapshotError::Corrupt("total duration is zero".into()));
        }
        if self.time_remaining_seconds > self.total_duration_seconds {
            return Err(SnapshotError::Corrupt(format!(
                "remaining {}s exceeds total {}s",
                self.time_remaining_seconds, self.total_duration_seconds
            )));
        }
        Ok(())
    }
}

/// On-disk shape: the snapshot plus when it was written.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SnapshotRecord {
    time_remaining_seconds: u64,
    total_duration_seconds: u64,
    current_phase: Phase,
    completed_study_count: u32,
    is_running: bool,
    is_paused: bool,
    last_observed_at: u64,
    saved_at: u64,
}

impl SnapshotRecord {
    fn new(s: &TimerSnapshot, saved_at: u64) -> Self {
        Self {
            time_remaining_seconds: s.time_remaining_seconds,
            total_duration_seconds: s.total_duration_seconds,
            current_phase: s.current_phase,
            completed_study_count: s.completed_study_count,
            is_running: s.is_running,
            is_paused: s.is_paused,
            last_observed_at: s.last_observed_at,
            saved_at,
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            time_remaining_seconds: self.time_remaining_seconds,
            total_duration_seconds: self.total_duration_seconds,
            current_phase: self.current_phase,
            completed_study_count: self.completed_study_count,
            is_running: self.is_running,
            is_paused: self.is_paused,
            last_observed_at: self.last_observed_at,
        }
    }
}

/// A persistent key-value slot.
pub trait SnapshotSlot: Send {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError>;
    fn write(&self, key: &str, value: &str) -> Result<(), SnapshotError>;
    fn clear(&self, key: &str) -> Result<(), SnapshotError>;
}

/// In-process slot. Clones share storage, so a test can keep a handle and
/// inspect or corrupt what the engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    /// Make every subsequent write fail, as a full or read-only store would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SnapshotError::Slot("memory slot is read-only".into()));
        }
        self.put(key, value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Reads and writes [`TimerSnapshot`]s through a [`SnapshotSlot`].
pub struct SnapshotStore {
    slot: Box<dyn SnapshotSlot>,
    key: String,
}

impl SnapshotStore {
    pub fn new(slot: impl SnapshotSlot + 'static) -> Self {
        Self::with_key(slot, SNAPSHOT_KEY)
    }

    pub fn with_key(slot: impl SnapshotSlot + 'static, key: &str) -> Self {
        Self {
            slot: Box::new(slot),
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the last snapshot. `Ok(None)` when nothing was ever saved.
    pub fn load(&self) -> Result<Option<TimerSnapshot>, SnapshotError> {
        let Some(raw) = self.slot.read(&self.key)? else {
            return Ok(None);
        };
        let record: SnapshotRecord =
            serde_json::from_str(&raw).map_err(|e| SnapshotError::Corrupt(e.to_string()))?;
        let snapshot = record.snapshot();
        snapshot.check()?;
        Ok(Some(snapshot))
    }

    /// Like [`load`](Self::load), but corrupt or unreadable data is logged,
    /// cleared and reported as absent.
    pub fn load_or_discard(&self) -> Option<TimerSnapshot> {
        match self.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %self.key, "discarding persisted timer state: {e}");
                if let Err(e) = self.slot.clear(&self.key) {
                    tracing::warn!(key = %self.key, "failed to clear persisted timer state: {e}");
                }
                None
            }
        }
    }

    /// Persist `snapshot`. Failures are logged; the caller keeps going.
    pub fn save(&self, snapshot: &TimerSnapshot, saved_at_ms: u64) {
        if let Err(e) = self.try_save(snapshot, saved_at_ms) {
            tracing::warn!(key = %self.key, "failed to persist timer state: {e}");
        }
    }

    pub fn try_save(&self, snapshot: &TimerSnapshot, saved_at_ms: u64) -> Result<(), SnapshotError> {
        let json = serde_json::to_string(&SnapshotRecord::new(snapshot, saved_at_ms))
            .map_err(|e| SnapshotError::Slot(e.to_string()))?;
        self.slot.write(&self.key, &json)
    }

    pub fn clear(&self) {
        if let Err(e) = self.slot.clear(&self.key) {
            tracing::warn!(key = %self.key, "failed to clear persisted timer state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TimerSnapshot {
        TimerSnapshot {
            time_remaining_seconds: 600,
            total_duration_seconds: 1500,
            current_phase: Phase::Study,
            completed_study_count: 2,
            is_running: true,
            is_paused: false,
            last_observed_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn save_then_load() {
        let slot = MemorySlot::new();
        let store = SnapshotStore::new(slot.clone());
        store.save(&sample(), 1_700_000_000_500);
        assert_eq!(store.load().unwrap(), Some(sample()));

        let raw: serde_json::Value = serde_json::from_str(&slot.get(SNAPSHOT_KEY).unwrap()).unwrap();
        assert_eq!(raw["timeRemainingSeconds"], 600);
        assert_eq!(raw["currentPhase"], "study");
        assert_eq!(raw["savedAt"], 1_700_000_000_500u64);
    }

    #[test]
    fn empty_slot_loads_none() {
        let store = SnapshotStore::new(MemorySlot::new());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn malformed_json_is_corrupt() {
        let slot = MemorySlot::new();
        slot.put(SNAPSHOT_KEY, "{not json");
        let store = SnapshotStore::new(slot.clone());
        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
        assert_eq!(store.load_or_discard(), None);
        assert!(slot.get(SNAPSHOT_KEY).is_none());
    }

    #[test]
    fn unknown_field_is_corrupt() {
        let slot = MemorySlot::new();
        slot.put(
            SNAPSHOT_KEY,
            r#"{"timeRemainingSeconds":1,"totalDurationSeconds":2,"currentPhase":"study",
                "completedStudyCount":0,"isRunning":false,"isPaused":false,
                "lastObservedAt":0,"savedAt":0,"version":2}"#,
        );
        let store = SnapshotStore::new(slot);
        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn remaining_above_total_is_corrupt() {
        let slot = MemorySlot::new();
        let store = SnapshotStore::new(slot);
        let mut bad = sample();
        bad.time_remaining_seconds = 2000;
        store.save(&bad, 0);
        assert!(matches!(store.load(), Err(SnapshotError::Corrupt(_))));
    }

    #[test]
    fn write_failure_is_swallowed() {
        let slot = MemorySlot::new();
        slot.set_fail_writes(true);
        let store = SnapshotStore::new(slot.clone());
        store.save(&sample(), 0);
        assert!(store.try_save(&sample(), 0).is_err());
        assert!(slot.get(SNAPSHOT_KEY).is_none());
    }

    #[test]
    fn paused_without_running_reads_as_idle() {
        let mut s = sample();
        s.is_running = false;
        s.is_paused = true;
        assert_eq!(s.state(), TimerState::Idle);
    }
}
