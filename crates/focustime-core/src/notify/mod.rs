//! Event subscribers: completion cues, UI signal, progress history.

mod cue;
mod notifier;
mod recorder;

pub use cue::{CommandCuePlayer, Cue, CuePlayer, SilentCuePlayer};
pub use notifier::{CompletionNotifier, SessionComplete};
pub use recorder::ProgressRecorder;
