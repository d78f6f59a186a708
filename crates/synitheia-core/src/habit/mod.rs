mod model;
mod period;
mod streak;

pub use model::{CheckIn, CheckInId, Difficulty, Habit, HabitDraft, HabitType};
pub use period::Period;
pub use streak::{calculate_streak, StreakSummary};
