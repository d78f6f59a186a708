//! Habit and check-in records.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::period::Period;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitType {
    Good,
    Bad,
}

impl HabitType {
    pub fn as_str(self) -> &'static str {
        match self {
            HabitType::Good => "good",
            HabitType::Bad => "bad",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "good" => Some(HabitType::Good),
            "bad" => Some(HabitType::Bad),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Points credited when a fully completed day is collected.
    pub fn reward_points(self) -> u32 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

/// The user-editable part of a habit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    pub times_per_day: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub period: Period,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub reminder_time: Option<NaiveTime>,
    #[serde(default)]
    pub time_taken_minutes: Option<u32>,
}

impl HabitDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            habit_type: HabitType::Good,
            times_per_day: 1,
            difficulty: Difficulty::Medium,
            period: Period::every_day(),
            label: String::new(),
            reminder_time: None,
            time_taken_minutes: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        if self.times_per_day < 1 {
            return Err(ValidationError::OutOfRange {
                field: "timesPerDay",
                value: i64::from(self.times_per_day),
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        self.period.validate()
    }

    fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.description = self.description.trim().to_string();
        self.label = self.label.trim().to_string();
        self
    }
}

/// Serialize-only: stored habits are rebuilt through `from_parts` so the
/// reward points always come from the difficulty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    id: String,
    owner_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub habit_type: HabitType,
    pub times_per_day: u32,
    pub difficulty: Difficulty,
    reward_points: u32,
    pub period: Period,
    pub label: String,
    pub reminder_time: Option<NaiveTime>,
    pub time_taken_minutes: Option<u32>,
    created_at: DateTime<Utc>,
}

impl Habit {
    /// Build a new habit from a validated draft.
    pub fn create(
        draft: HabitDraft,
        owner_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        draft.validate()?;
        let draft = draft.normalized();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            reward_points: draft.difficulty.reward_points(),
            name: draft.name,
            description: draft.description,
            habit_type: draft.habit_type,
            times_per_day: draft.times_per_day,
            difficulty: draft.difficulty,
            period: draft.period,
            label: draft.label,
            reminder_time: draft.reminder_time,
            time_taken_minutes: draft.time_taken_minutes,
            created_at,
        })
    }

    /// Rebuild a habit from stored columns. Reward points are re-derived.
    pub(crate) fn from_parts(
        id: String,
        owner_id: String,
        draft: HabitDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            reward_points: draft.difficulty.reward_points(),
            name: draft.name,
            description: draft.description,
            habit_type: draft.habit_type,
            times_per_day: draft.times_per_day,
            difficulty: draft.difficulty,
            period: draft.period,
            label: draft.label,
            reminder_time: draft.reminder_time,
            time_taken_minutes: draft.time_taken_minutes,
            created_at,
        }
    }

    /// Replace the editable fields. `id` and `created_at` are kept.
    pub fn apply(&mut self, draft: HabitDraft) -> Result<(), ValidationError> {
        draft.validate()?;
        let draft = draft.normalized();
        self.reward_points = draft.difficulty.reward_points();
        self.name = draft.name;
        self.description = draft.description;
        self.habit_type = draft.habit_type;
        self.times_per_day = draft.times_per_day;
        self.difficulty = draft.difficulty;
        self.period = draft.period;
        self.label = draft.label;
        self.reminder_time = draft.reminder_time;
        self.time_taken_minutes = draft.time_taken_minutes;
        Ok(())
    }

    pub fn draft(&self) -> HabitDraft {
        HabitDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            habit_type: self.habit_type,
            times_per_day: self.times_per_day,
            difficulty: self.difficulty,
            period: self.period.clone(),
            label: self.label.clone(),
            reminder_time: self.reminder_time,
            time_taken_minutes: self.time_taken_minutes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn reward_points(&self) -> u32 {
        self.reward_points
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.period.is_due_on(date, self.created_at.date_naive())
    }
}

/// One habit's progress on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub habit_id: String,
    pub owner_id: String,
    pub date: NaiveDate,
    pub daily_completion_count: u32,
    pub reward_collected: bool,
}

impl CheckIn {
    pub fn id(&self) -> CheckInId {
        CheckInId::new(&self.habit_id, self.date)
    }

    /// "completed" once the habit was done at least once that day.
    pub fn status(&self) -> &'static str {
        if self.daily_completion_count >= 1 {
            "completed"
        } else {
            "pending"
        }
    }

    pub fn is_fully_completed(&self, times_per_day: u32) -> bool {
        self.daily_completion_count >= times_per_day
    }
}

/// Composite identity of a check-in: one per habit per day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckInId {
    pub habit_id: String,
    pub date: NaiveDate,
}

impl CheckInId {
    pub fn new(habit_id: &str, date: NaiveDate) -> Self {
        Self {
            habit_id: habit_id.to_string(),
            date,
        }
    }
}

impl std::fmt::Display for CheckInId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.habit_id, self.date.format("%Y-%m-%d"))
    }
}
