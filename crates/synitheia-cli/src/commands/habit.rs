//! Habit management commands for CLI.

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Subcommand};
use synitheia_core::habit::{Difficulty, HabitDraft, HabitType, Period};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Define a new habit
    Add {
        /// Habit name
        name: String,
        #[command(flatten)]
        fields: HabitFields,
    },
    /// List habits with today's progress and streaks
    List {
        /// Day to report progress for (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Show one habit
    Get {
        /// Habit ID
        id: String,
    },
    /// Change a habit; omitted fields keep their value
    Edit {
        /// Habit ID
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: HabitFields,
    },
    /// Delete a habit and its check-ins
    Delete {
        /// Habit ID
        id: String,
    },
    /// Record one completion for today
    Checkin {
        /// Habit ID
        id: String,
    },
    /// Remove the last completion of a day
    Undo {
        /// Habit ID
        id: String,
        /// Day to undo (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Collect the reward of a fully completed day
    Collect {
        /// Habit ID
        id: String,
        /// Day to collect (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Show current and longest streak
    Streak {
        /// Habit ID
        id: String,
    },
}

#[derive(Args)]
pub struct HabitFields {
    /// Description
    #[arg(long)]
    description: Option<String>,
    /// good or bad
    #[arg(long = "type", value_parser = parse_habit_type)]
    habit_type: Option<HabitType>,
    /// Completions needed per day
    #[arg(long)]
    times_per_day: Option<u32>,
    /// easy, medium or hard
    #[arg(long, value_parser = parse_difficulty)]
    difficulty: Option<Difficulty>,
    /// Comma-separated weekdays, 0 = Sunday (e.g. "1,3,5")
    #[arg(long, conflicts_with_all = ["month_days", "every"])]
    weekdays: Option<String>,
    /// Comma-separated days of the month (e.g. "1,15")
    #[arg(long, conflicts_with = "every")]
    month_days: Option<String>,
    /// Repeat every N days from creation
    #[arg(long)]
    every: Option<u32>,
    /// Free-form label
    #[arg(long)]
    label: Option<String>,
    /// Daily reminder time, HH:MM
    #[arg(long, value_parser = parse_time)]
    reminder: Option<NaiveTime>,
    /// Drop the reminder
    #[arg(long, conflicts_with = "reminder")]
    no_reminder: bool,
    /// Estimated minutes per completion
    #[arg(long)]
    minutes: Option<u32>,
}

impl HabitFields {
    fn apply(self, draft: &mut HabitDraft) -> Result<(), String> {
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(habit_type) = self.habit_type {
            draft.habit_type = habit_type;
        }
        if let Some(times) = self.times_per_day {
            draft.times_per_day = times;
        }
        if let Some(difficulty) = self.difficulty {
            draft.difficulty = difficulty;
        }
        if let Some(days) = self.weekdays {
            draft.period = Period::Daily {
                selected_days_of_week: parse_day_set(&days)?,
            };
        }
        if let Some(days) = self.month_days {
            draft.period = Period::Monthly {
                selected_days_of_month: parse_day_set(&days)?,
            };
        }
        if let Some(interval_days) = self.every {
            draft.period = Period::Interval { interval_days };
        }
        if let Some(label) = self.label {
            draft.label = label;
        }
        if self.no_reminder {
            draft.reminder_time = None;
        } else if let Some(at) = self.reminder {
            draft.reminder_time = Some(at);
        }
        if let Some(minutes) = self.minutes {
            draft.time_taken_minutes = Some(minutes);
        }
        Ok(())
    }
}

pub fn run(action: HabitAction, user: Option<String>) -> CliResult {
    let ctx = Context::load(user)?;
    let svc = ctx.habits();
    let today = || Local::now().date_naive();

    match action {
        HabitAction::Add { name, fields } => {
            let mut draft = HabitDraft::new(name);
            fields.apply(&mut draft)?;
            let saved = svc.add_habit(draft)?;
            eprintln!("Habit created: {}", saved.habit.id());
            print_json(&saved)?;
        }
        HabitAction::List { date } => {
            print_json(&svc.list_with_progress(date.unwrap_or_else(today))?)?;
        }
        HabitAction::Get { id } => print_json(&svc.habit(&id)?)?,
        HabitAction::Edit { id, name, fields } => {
            let mut draft = svc.habit(&id)?.draft();
            if let Some(name) = name {
                draft.name = name;
            }
            fields.apply(&mut draft)?;
            print_json(&svc.update_habit(&id, draft)?)?;
        }
        HabitAction::Delete { id } => {
            let removed = svc.delete_habit(&id)?;
            print_json(&serde_json::json!({ "deleted": id, "checkInsRemoved": removed }))?;
        }
        HabitAction::Checkin { id } => {
            let progress = svc.check_in(&id)?;
            print_json(&serde_json::json!({
                "checkIn": progress.check_in,
                "timesPerDay": progress.times_per_day,
                "fullyCompleted": progress.fully_completed(),
            }))?;
        }
        HabitAction::Undo { id, date } => {
            print_json(&svc.undo_check_in(&id, date.unwrap_or_else(today))?)?;
        }
        HabitAction::Collect { id, date } => {
            print_json(&svc.collect_reward(&id, date.unwrap_or_else(today))?)?;
        }
        HabitAction::Streak { id } => print_json(&svc.streak(&id, today())?)?,
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_habit_type(s: &str) -> Result<HabitType, String> {
    HabitType::parse(s).ok_or_else(|| format!("unknown habit type '{s}' (good, bad)"))
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::parse(s).ok_or_else(|| format!("unknown difficulty '{s}' (easy, medium, hard)"))
}

fn parse_day_set(s: &str) -> Result<BTreeSet<u8>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u8>().map_err(|_| format!("invalid day '{part}'")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_sets_parse_and_dedupe() {
        let days = parse_day_set("1, 3,3,5").unwrap();
        assert_eq!(days.into_iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(parse_day_set("1,x").is_err());
    }

    #[test]
    fn fields_override_only_what_is_given() {
        let mut draft = HabitDraft::new("Read");
        let fields = HabitFields {
            description: None,
            habit_type: None,
            times_per_day: Some(3),
            difficulty: Some(Difficulty::Hard),
            weekdays: None,
            month_days: Some("1,15".into()),
            every: None,
            label: None,
            reminder: None,
            no_reminder: false,
            minutes: None,
        };
        fields.apply(&mut draft).unwrap();
        assert_eq!(draft.times_per_day, 3);
        assert_eq!(draft.difficulty, Difficulty::Hard);
        assert_eq!(draft.habit_type, HabitType::Good);
        assert!(matches!(draft.period, Period::Monthly { .. }));
    }
}
