mod config;
pub mod database;
pub mod snapshot;

pub use config::{Config, NotificationsConfig, SettingsApiConfig, TimerConfig};
pub use database::{Database, PhaseRecord, Stats};
pub use snapshot::{MemorySlot, SnapshotSlot, SnapshotStore, TimerSnapshot, SNAPSHOT_KEY};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Environment variable selecting the data profile; `dev` keeps a separate directory.
const PROFILE_VAR: &str = "FOCUSTIME_ENV";

/// Where `config.toml` and `focustime.db` live, created on first use.
///
/// `~/.config/focustime`, or `~/.config/focustime-dev` for the dev profile.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConfigError::DataDir("no home directory for focustime data".into()))?;
    let profile = std::env::var(PROFILE_VAR).ok();
    let dir = profile_dir(&home, profile.as_deref());
    std::fs::create_dir_all(&dir).map_err(|e| {
        ConfigError::DataDir(format!("cannot create focustime data at {}: {e}", dir.display()))
    })?;
    Ok(dir)
}

fn profile_dir(home: &Path, profile: Option<&str>) -> PathBuf {
    let name = match profile {
        Some("dev") => "focustime-dev",
        _ => "focustime",
    };
    home.join(".config").join(name)
}
