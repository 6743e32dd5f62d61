use serde::{Deserialize, Serialize};

use crate::settings::PomodoroSettings;

/// Every fourth completed study phase is followed by a long break.
pub const STUDY_PHASES_PER_LONG_BREAK: u32 = 4;

/// One segment of the focus/break cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Study,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Study)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Study => "study",
            Phase::ShortBreak => "short_break",
            Phase::LongBreak => "long_break",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Study => "Study",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    /// Configured length of this phase in minutes.
    pub fn minutes(self, settings: &PomodoroSettings) -> u32 {
        match self {
            Phase::Study => settings.study_minutes,
            Phase::ShortBreak => settings.short_break_minutes,
            Phase::LongBreak => settings.long_break_minutes,
        }
    }

    /// Configured length of this phase in seconds.
    pub fn duration_secs(self, settings: &PomodoroSettings) -> u64 {
        u64::from(self.minutes(settings)).saturating_mul(60)
    }

    /// The phase that follows this one, given the study count *after* any
    /// increment for this completion.
    pub fn next(self, completed_study_count: u32) -> Phase {
        match self {
            Phase::Study => {
                if completed_study_count % STUDY_PHASES_PER_LONG_BREAK == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Study,
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        match s {
            "study" => Some(Phase::Study),
            "short_break" => Some(Phase::ShortBreak),
            "long_break" => Some(Phase::LongBreak),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
