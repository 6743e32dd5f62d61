//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - The key-value slot holding the timer snapshot
//! - Completed phase history and progress statistics

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use super::snapshot::SnapshotSlot;
use crate::error::{CoreError, DatabaseError, SnapshotError};
use crate::events::CompletionEvent;
use crate::timer::Phase;

/// One completed (or skipped) phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub id: i64,
    pub phase: Phase,
    pub duration_secs: u64,
    pub elapsed_secs: u64,
    pub skipped: bool,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_phases: u64,
    pub completed_study_phases: u64,
    pub skipped_phases: u64,
    pub total_study_secs: u64,
    pub total_break_secs: u64,
    pub today_study_phases: u64,
    pub today_study_secs: u64,
}

/// SQLite database for local state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/focustime/focustime.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("focustime.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS phases (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                phase         TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                elapsed_secs  INTEGER NOT NULL,
                skipped       INTEGER NOT NULL DEFAULT 0,
                completed_at  TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_phases_completed_at ON phases(completed_at);",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Append a completed phase to the history.
    pub fn record_phase(&self, completion: &CompletionEvent) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO phases (phase, duration_secs, elapsed_secs, skipped, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                completion.completed_phase.as_str(),
                completion.duration_secs,
                completion.elapsed_secs,
                completion.skipped,
                completion.at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent phases first.
    pub fn recent_phases(&self, limit: usize) -> Result<Vec<PhaseRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, phase, duration_secs, elapsed_secs, skipped, completed_at
             FROM phases
             ORDER BY id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, phase, duration_secs, elapsed_secs, skipped, completed_at) = row?;
            let Some(phase) = Phase::parse(&phase) else {
                tracing::warn!(id, phase = %phase, "skipping history row with unknown phase");
                continue;
            };
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            records.push(PhaseRecord {
                id,
                phase,
                duration_secs,
                elapsed_secs,
                skipped,
                completed_at,
            });
        }
        Ok(records)
    }

    /// All-time totals plus today's study figures (UTC day of `now`).
    pub fn stats(&self, now: DateTime<Utc>) -> Result<Stats, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT phase, skipped, COUNT(*), COALESCE(SUM(elapsed_secs), 0)
             FROM phases
             GROUP BY phase, skipped",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, bool>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (phase, skipped, count, secs) = row?;
            stats.total_phases += count;
            if skipped {
                stats.skipped_phases += count;
            }
            match Phase::parse(&phase) {
                Some(Phase::Study) => {
                    if !skipped {
                        stats.completed_study_phases += count;
                    }
                    stats.total_study_secs += secs;
                }
                Some(Phase::ShortBreak | Phase::LongBreak) => stats.total_break_secs += secs,
                None => {}
            }
        }

        let today = now.date_naive();
        let tomorrow = today + chrono::Days::new(1);
        let (today_phases, today_secs) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(elapsed_secs), 0)
             FROM phases
             WHERE phase = 'study' AND skipped = 0
               AND completed_at >= ?1 AND completed_at < ?2",
            params![
                format!("{today}T00:00:00+00:00"),
                format!("{tomorrow}T00:00:00+00:00"),
            ],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        stats.today_study_phases = today_phases;
        stats.today_study_secs = today_secs;

        Ok(stats)
    }
}

impl SnapshotSlot for Database {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        Ok(self.kv_get(key)?)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        Ok(self.kv_set(key, value)?)
    }

    fn clear(&self, key: &str) -> Result<(), SnapshotError> {
        Ok(self.kv_delete(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn completion(phase: Phase, elapsed: u64, skipped: bool, at: DateTime<Utc>) -> CompletionEvent {
        CompletionEvent {
            completed_phase: phase,
            next_phase: phase.next(1),
            completed_study_count: 1,
            duration_secs: 1500,
            elapsed_secs: elapsed,
            skipped,
            at,
        }
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        let yesterday = now - chrono::Duration::days(1);

        db.record_phase(&completion(Phase::Study, 1500, false, yesterday)).unwrap();
        db.record_phase(&completion(Phase::ShortBreak, 300, false, now)).unwrap();
        db.record_phase(&completion(Phase::Study, 1500, false, now)).unwrap();
        db.record_phase(&completion(Phase::Study, 200, true, now)).unwrap();

        let stats = db.stats(now).unwrap();
        assert_eq!(stats.total_phases, 4);
        assert_eq!(stats.completed_study_phases, 2);
        assert_eq!(stats.skipped_phases, 1);
        assert_eq!(stats.total_study_secs, 3200);
        assert_eq!(stats.total_break_secs, 300);
        assert_eq!(stats.today_study_phases, 1);
        assert_eq!(stats.today_study_secs, 1500);

        let recent = db.recent_phases(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].phase, Phase::Study);
        assert!(recent[0].skipped);
        assert_eq!(recent[1].completed_at, now);
    }

    #[test]
    fn today_excludes_rows_dated_after_today() {
        let db = Database::open_memory().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 23, 59, 0).unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2026, 3, 3, 0, 0, 0).unwrap();

        db.record_phase(&completion(Phase::Study, 1500, false, now)).unwrap();
        db.record_phase(&completion(Phase::Study, 1500, false, tomorrow)).unwrap();
        db.record_phase(&completion(Phase::Study, 900, false, tomorrow + chrono::Duration::hours(5)))
            .unwrap();

        let stats = db.stats(now).unwrap();
        assert_eq!(stats.completed_study_phases, 3);
        assert_eq!(stats.today_study_phases, 1);
        assert_eq!(stats.today_study_secs, 1500);
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
