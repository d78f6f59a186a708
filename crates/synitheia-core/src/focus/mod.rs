//! Focus mode: the session state machine, its collaborators, and the async
//! driver that runs it against the wall clock.

mod collaborators;
mod driver;
mod machine;
mod messages;
mod presence;
mod settings;

pub use collaborators::{ExclusiveDisplay, HabitCheckIn, LogNotifier, NoExclusiveDisplay, Notifier};
pub use driver::FocusDriver;
pub use machine::{Collaborators, FocusInput, FocusSession, Phase, Prompt, TICK_MS};
pub use messages::motivational_message;
pub use presence::{Direction, PresenceEnforcer, SelfTransition};
pub use settings::FocusSettings;
