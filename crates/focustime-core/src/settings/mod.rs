//! User timer settings and their remote synchronization.

mod backend;
mod store;
mod types;

pub use backend::{HttpSettingsBackend, SettingsBackend};
pub use store::{SaveOutcome, SettingsStore};
pub use types::{PomodoroSettings, SettingsBody, SettingsPatch, SettingsRecord, ValidPatch};
