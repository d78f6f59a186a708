//! # Synitheia Core Library
//!
//! Business logic for Synitheia, a habit tracker with a focus timer. Every
//! operation is available to the standalone CLI; any other front end is a thin
//! layer over the same library.
//!
//! ## Architecture
//!
//! - **Habits**: habit definitions, recurrence periods, daily check-ins and
//!   streaks, persisted in SQLite through [`Database`]
//! - **Rewards**: a per-user point balance in [`RewardLedger`], credited by
//!   collected habit rewards and completed focus sessions, debited by
//!   focus violations
//! - **Focus**: [`FocusSession`], a synchronous state machine that the caller
//!   drives with inputs (one `Tick` per second), and [`FocusDriver`], which
//!   hosts it on a tokio task
//! - **Config**: TOML settings in the data directory
//!
//! ## Key Components
//!
//! - [`HabitService`]: habit operations scoped to one user
//! - [`FocusSession`]: focus/break cycle, presence enforcement, penalties
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod focus;
pub mod habit;
pub mod ledger;
pub mod service;
pub mod storage;
pub mod timer;

pub use error::{Capability, ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{FocusEvent, FocusSnapshot, PenaltyReason};
pub use focus::{
    Collaborators, ExclusiveDisplay, FocusDriver, FocusInput, FocusSession, FocusSettings,
    HabitCheckIn, Notifier, Phase, Prompt,
};
pub use habit::{CheckIn, CheckInId, Difficulty, Habit, HabitDraft, HabitType, Period, StreakSummary};
pub use ledger::RewardLedger;
pub use service::{HabitService, UserContext};
pub use storage::{Config, Database};
pub use timer::{Countdown, SessionType, TimerState};
