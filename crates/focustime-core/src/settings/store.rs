//! Optimistic settings cache over a [`SettingsBackend`].

use tokio::sync::{watch, Mutex};

use super::backend::SettingsBackend;
use super::types::{PomodoroSettings, SettingsPatch};
use crate::error::{SettingsError, ValidationError};

/// What `save` did with a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Applied locally and written remotely.
    Saved(PomodoroSettings),
    /// Empty patch; nothing to do.
    Unchanged,
    /// Failed validation; nothing was applied or sent.
    Ignored(ValidationError),
}

/// Holds the current user's settings and syncs them with the remote store.
///
/// Local changes are applied before the remote write completes. A failed
/// write is reported but not rolled back; the next successful [`load`] is the
/// reconciliation point.
///
/// [`load`]: SettingsStore::load
pub struct SettingsStore<B> {
    backend: B,
    current: watch::Sender<PomodoroSettings>,
    /// Record id from the last fetch/create. The lock also serializes remote writes.
    record_id: Mutex<Option<String>>,
}

impl<B: SettingsBackend> SettingsStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_initial(backend, PomodoroSettings::default())
    }

    /// Start from previously known settings (e.g. the values the engine last used).
    pub fn with_initial(backend: B, initial: PomodoroSettings) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            backend,
            current,
            record_id: Mutex::new(None),
        }
    }

    pub fn current(&self) -> PomodoroSettings {
        *self.current.borrow()
    }

    /// Change feed; receivers see every optimistic and loaded value.
    pub fn subscribe(&self) -> watch::Receiver<PomodoroSettings> {
        self.current.subscribe()
    }

    pub async fn record_id(&self) -> Option<String> {
        self.record_id.lock().await.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the user's settings.
    ///
    /// Returns defaults for a user with no record or no session. Only network
    /// and server failures are errors; the cached value is left as it was.
    pub async fn load(&self) -> Result<PomodoroSettings, SettingsError> {
        let mut record_id = self.record_id.lock().await;
        let settings = match self.backend.fetch_current().await {
            Ok(Some(record)) => {
                *record_id = Some(record.id.clone());
                match record.to_settings() {
                    Some(settings) => settings,
                    None => {
                        tracing::warn!(id = %record.id, "stored settings have zero durations, using defaults");
                        PomodoroSettings::default()
                    }
                }
            }
            Ok(None) => {
                tracing::debug!("no settings record yet, using defaults");
                *record_id = None;
                PomodoroSettings::default()
            }
            Err(SettingsError::NotAuthenticated) => {
                tracing::debug!("not signed in, using default settings");
                PomodoroSettings::default()
            }
            Err(e) => {
                tracing::warn!("failed to load settings: {e}");
                return Err(e);
            }
        };
        self.current.send_replace(settings);
        Ok(settings)
    }

    /// Apply `patch` locally, then persist it remotely.
    ///
    /// Creates the record when no id is known yet, updates it otherwise.
    pub async fn save(&self, patch: SettingsPatch) -> Result<SaveOutcome, SettingsError> {
        let valid = match patch.validate() {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!("ignoring invalid settings change: {e}");
                return Ok(SaveOutcome::Ignored(e));
            }
        };
        if patch.is_empty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let mut next = self.current();
        self.current.send_modify(|settings| {
            *settings = settings.merged(&valid);
            next = *settings;
        });

        let mut record_id = self.record_id.lock().await;
        let result = match record_id.as_deref() {
            Some(id) => self.backend.update(id, next.to_body()).await,
            None => self.backend.create(next.to_body()).await,
        };

        match result {
            Ok(record) => {
                tracing::debug!(id = %record.id, "settings saved");
                *record_id = Some(record.id);
                Ok(SaveOutcome::Saved(next))
            }
            Err(e) => {
                tracing::warn!("failed to save settings, keeping local value: {e}");
                Err(e)
            }
        }
    }
}
