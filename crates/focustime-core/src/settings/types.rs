use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// User-configurable timer parameters.
///
/// One instance per user account. Durations are whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSettings {
    #[serde(default = "default_study_minutes")]
    pub study_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_true")]
    pub show_timer: bool,
}

fn default_study_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_true() -> bool {
    true
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            study_minutes: default_study_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            show_timer: true,
        }
    }
}

impl PomodoroSettings {
    /// Apply an already-validated patch, returning the merged settings.
    pub fn merged(&self, patch: &ValidPatch) -> Self {
        Self {
            study_minutes: patch.study_minutes.unwrap_or(self.study_minutes),
            short_break_minutes: patch
                .short_break_minutes
                .unwrap_or(self.short_break_minutes),
            long_break_minutes: patch.long_break_minutes.unwrap_or(self.long_break_minutes),
            show_timer: patch.show_timer.unwrap_or(self.show_timer),
        }
    }

    pub(crate) fn to_body(self) -> SettingsBody {
        SettingsBody {
            study_time: self.study_minutes,
            short_break: self.short_break_minutes,
            long_break: self.long_break_minutes,
            show_timer: self.show_timer,
        }
    }
}

/// A partial settings change as it arrives from the UI.
///
/// Numeric fields are signed so that zero or negative input survives until
/// [`SettingsPatch::validate`] rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub study_minutes: Option<i64>,
    #[serde(default)]
    pub short_break_minutes: Option<i64>,
    #[serde(default)]
    pub long_break_minutes: Option<i64>,
    #[serde(default)]
    pub show_timer: Option<bool>,
}

/// A patch whose numeric fields are known to be positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidPatch {
    pub study_minutes: Option<u32>,
    pub short_break_minutes: Option<u32>,
    pub long_break_minutes: Option<u32>,
    pub show_timer: Option<bool>,
}

impl SettingsPatch {
    pub fn study_minutes(minutes: i64) -> Self {
        Self {
            study_minutes: Some(minutes),
            ..Self::default()
        }
    }

    pub fn short_break_minutes(minutes: i64) -> Self {
        Self {
            short_break_minutes: Some(minutes),
            ..Self::default()
        }
    }

    pub fn long_break_minutes(minutes: i64) -> Self {
        Self {
            long_break_minutes: Some(minutes),
            ..Self::default()
        }
    }

    pub fn show_timer(show: bool) -> Self {
        Self {
            show_timer: Some(show),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.study_minutes.is_none()
            && self.short_break_minutes.is_none()
            && self.long_break_minutes.is_none()
            && self.show_timer.is_none()
    }

    /// Check every numeric field. The first offending field rejects the whole patch.
    pub fn validate(&self) -> Result<ValidPatch, ValidationError> {
        Ok(ValidPatch {
            study_minutes: positive_minutes("study_minutes", self.study_minutes)?,
            short_break_minutes: positive_minutes(
                "short_break_minutes",
                self.short_break_minutes,
            )?,
            long_break_minutes: positive_minutes("long_break_minutes", self.long_break_minutes)?,
            show_timer: self.show_timer,
        })
    }
}

fn positive_minutes(field: &'static str, value: Option<i64>) -> Result<Option<u32>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value <= 0 {
        return Err(ValidationError::NonPositiveMinutes { field, value });
    }
    u32::try_from(value)
        .map(Some)
        .map_err(|_| ValidationError::TooLarge {
            field,
            value,
            max: u32::MAX,
        })
}

/// Wire body for create/update requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsBody {
    pub study_time: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub show_timer: bool,
}

/// Remote settings record as stored by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    /// Opaque identifier assigned by the store on first creation.
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub study_time: u32,
    pub short_break: u32,
    pub long_break: u32,
    #[serde(default = "default_true")]
    pub show_timer: bool,
}

impl SettingsRecord {
    /// Convert to settings, rejecting zero durations the server may hold.
    pub fn to_settings(&self) -> Option<PomodoroSettings> {
        if self.study_time == 0 || self.short_break == 0 || self.long_break == 0 {
            return None;
        }
        Some(PomodoroSettings {
            study_minutes: self.study_time,
            short_break_minutes: self.short_break,
            long_break_minutes: self.long_break,
            show_timer: self.show_timer,
        })
    }
}

/// Stores hand out either string or numeric ids; keep them as strings.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
