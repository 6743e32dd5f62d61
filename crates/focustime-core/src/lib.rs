//! # Focustime Core Library
//!
//! The focus-session timer behind the study assistant: an alternating
//! sequence of study and break phases that survives restarts without losing
//! time, sizes each phase from the user's synced settings, and announces
//! every phase completion to whoever is listening.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine; the caller (or the
//!   [`TimerDriver`]) invokes `tick()` for progress updates
//! - **Snapshot Store**: Persists the engine's runtime state to a local
//!   key-value slot after every change and restores it at startup
//! - **Settings Store**: Optimistic cache of the user's durations, synced with
//!   a remote REST endpoint
//! - **Notify**: Event-bus subscribers for completion cues, UI signals and
//!   progress history
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SnapshotStore`]: Runtime-state persistence
//! - [`SettingsStore`]: Remote settings sync
//! - [`CompletionNotifier`]: Phase-completion side effects
//! - [`Config`]: Host configuration

pub mod error;
pub mod events;
pub mod notify;
pub mod settings;
pub mod storage;
pub mod timer;

pub use error::{
    ConfigError, CoreError, CueError, DatabaseError, SettingsError, SnapshotError, ValidationError,
};
pub use events::{CompletionEvent, Event, EventBus};
pub use notify::{CompletionNotifier, ProgressRecorder, SessionComplete};
pub use settings::{
    HttpSettingsBackend, PomodoroSettings, SaveOutcome, SettingsBackend, SettingsPatch,
    SettingsStore,
};
pub use storage::{Config, Database, MemorySlot, SnapshotSlot, SnapshotStore, TimerSnapshot};
pub use timer::{Clock, ManualClock, Phase, SystemClock, TimerDriver, TimerEngine, TimerState};
