//! Audible cues for phase boundaries.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::CueError;
use crate::storage::NotificationsConfig;
use crate::timer::Phase;

/// Which boundary a cue announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Study ended, a break begins.
    BreakTime,
    /// A break ended, back to study.
    BackToStudy,
}

impl Cue {
    pub fn for_next_phase(next: Phase) -> Cue {
        if next.is_break() {
            Cue::BreakTime
        } else {
            Cue::BackToStudy
        }
    }
}

pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue) -> Result<(), CueError>;
}

/// Plays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&self, _cue: Cue) -> Result<(), CueError> {
        Ok(())
    }
}

/// Plays a sound file through an external command (`afplay`, `paplay`, ...).
///
/// The command is spawned and reaped on a background thread; `play` never
/// waits for the sound to finish.
#[derive(Debug, Clone)]
pub struct CommandCuePlayer {
    player: String,
    sound: PathBuf,
}

impl CommandCuePlayer {
    pub fn new(player: impl Into<String>, sound: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            sound: sound.into(),
        }
    }

    /// Build from config. `None` when cues are disabled or no sound is set.
    pub fn from_config(config: &NotificationsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let sound = config.sound_path.clone()?;
        let player = config
            .player
            .clone()
            .or_else(|| default_player().map(str::to_string))?;
        Some(Self::new(player, sound))
    }
}

impl CuePlayer for CommandCuePlayer {
    fn play(&self, cue: Cue) -> Result<(), CueError> {
        if !self.sound.exists() {
            return Err(CueError::MissingSound(self.sound.clone()));
        }
        let mut child = Command::new(&self.player)
            .arg(&self.sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CueError::Launch {
                player: self.player.clone(),
                source,
            })?;
        tracing::debug!(?cue, player = %self.player, "cue playing");
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

fn default_player() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("afplay")
    } else if cfg!(target_os = "linux") {
        Some("paplay")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_follows_next_phase() {
        assert_eq!(Cue::for_next_phase(Phase::ShortBreak), Cue::BreakTime);
        assert_eq!(Cue::for_next_phase(Phase::LongBreak), Cue::BreakTime);
        assert_eq!(Cue::for_next_phase(Phase::Study), Cue::BackToStudy);
    }

    #[test]
    fn missing_sound_is_an_error() {
        let player = CommandCuePlayer::new("afplay", "/definitely/not/here.wav");
        assert!(matches!(
            player.play(Cue::BreakTime),
            Err(CueError::MissingSound(_))
        ));
    }

    #[test]
    fn unknown_player_fails_to_launch() {
        let sound = tempfile::NamedTempFile::new().unwrap();
        let player = CommandCuePlayer::new("focustime-no-such-player", sound.path());
        assert!(matches!(
            player.play(Cue::BackToStudy),
            Err(CueError::Launch { .. })
        ));
    }

    #[test]
    fn disabled_config_builds_nothing() {
        let config = NotificationsConfig {
            enabled: false,
            sound_path: Some(PathBuf::from("/tmp/ding.wav")),
            player: Some("afplay".into()),
        };
        assert!(CommandCuePlayer::from_config(&config).is_none());

        let no_sound = NotificationsConfig {
            enabled: true,
            sound_path: None,
            ..config.clone()
        };
        assert!(CommandCuePlayer::from_config(&no_sound).is_none());
    }
}
