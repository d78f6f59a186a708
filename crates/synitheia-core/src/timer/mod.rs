mod countdown;
mod session;

pub use countdown::{Countdown, Tick, TimerState};
pub use session::{minutes_to_secs, SessionDurations, SessionType};
