mod clock;
mod driver;
mod engine;
mod phase;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{SharedEngine, TimerDriver};
pub use engine::{TimerEngine, TimerState};
pub use phase::{Phase, STUDY_PHASES_PER_LONG_BREAK};
