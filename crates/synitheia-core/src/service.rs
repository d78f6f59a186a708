//! Habit controller for one user.
//!
//! `HabitService` is what the surrounding UI calls: it scopes every store
//! operation to the current [`UserContext`], routes point changes through the
//! [`RewardLedger`], schedules reminders and keeps the error flag. After a
//! storage failure every mutation is refused with [`CoreError::Halted`] until
//! the caller acknowledges it with [`HabitService::clear_error`].

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::focus::{HabitCheckIn, Notifier};
use crate::habit::{calculate_streak, CheckIn, CheckInId, Habit, HabitDraft, StreakSummary};
use crate::ledger::RewardLedger;
use crate::storage::{CheckInProgress, Database, UndoOutcome};

/// The user every operation is performed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// What happened to a habit's reminder on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReminderStatus {
    NotRequested,
    Scheduled {
        #[serde(rename = "delayMinutes")]
        delay_minutes: u32,
    },
    PermissionDenied,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedHabit {
    pub habit: Habit,
    pub reminder: ReminderStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    pub check_in: CheckIn,
    pub points: u32,
    pub balance: u32,
}

/// A habit with everything a list view shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitProgress {
    pub habit: Habit,
    pub check_ins: Vec<CheckIn>,
    pub today_count: u32,
    pub reward_collected_today: bool,
    pub streak: StreakSummary,
    pub due_today: bool,
    pub period_description: String,
}

pub struct HabitService {
    db: Arc<Database>,
    ledger: RewardLedger,
    user: UserContext,
    notifier: Arc<dyn Notifier>,
    error: Mutex<Option<String>>,
}

impl HabitService {
    pub fn new(db: Arc<Database>, user: UserContext, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ledger: RewardLedger::new(Arc::clone(&db)),
            db,
            user,
            notifier,
            error: Mutex::new(None),
        }
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    // ── Error flag ───────────────────────────────────────────────────

    /// The unacknowledged storage failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|e| e.clone())
    }

    pub fn clear_error(&self) {
        if let Ok(mut e) = self.error.lock() {
            *e = None;
        }
    }

    fn mutate<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(message) = self.last_error() {
            return Err(CoreError::Halted(message));
        }
        let result = op();
        if let Err(ref e) = result {
            if e.is_storage_failure() {
                tracing::error!("storage failure, halting mutations: {e}");
                if let Ok(mut flag) = self.error.lock() {
                    *flag = Some(e.to_string());
                }
            } else {
                tracing::warn!("operation refused: {e}");
            }
        }
        result
    }

    // ── Habits ───────────────────────────────────────────────────────

    pub fn add_habit(&self, draft: HabitDraft) -> Result<SavedHabit> {
        let habit = self.mutate(|| self.db.create_habit(draft, self.user.user_id()))?;
        let reminder = self.schedule_reminder(&habit, Local::now().naive_local());
        Ok(SavedHabit { habit, reminder })
    }

    pub fn update_habit(&self, id: &str, draft: HabitDraft) -> Result<SavedHabit> {
        let habit = self.mutate(|| self.db.update_habit(id, draft, self.user.user_id()))?;
        let reminder = self.schedule_reminder(&habit, Local::now().naive_local());
        Ok(SavedHabit { habit, reminder })
    }

    /// Delete a habit and its check-ins.
    pub fn delete_habit(&self, id: &str) -> Result<usize> {
        self.mutate(|| self.db.delete_habit(id, self.user.user_id()))
    }

    pub fn habits(&self) -> Result<Vec<Habit>> {
        self.db.list_habits(self.user.user_id())
    }

    pub fn habit(&self, id: &str) -> Result<Habit> {
        self.db.get_habit(id, self.user.user_id())
    }

    /// Ask for permission and schedule the next reminder, if the habit has one.
    pub fn schedule_reminder(&self, habit: &Habit, now: NaiveDateTime) -> ReminderStatus {
        let Some(at) = habit.reminder_time else {
            return ReminderStatus::NotRequested;
        };
        if !self.notifier.request_permission() {
            tracing::warn!(habit_id = habit.id(), "notification permission denied, reminder not set");
            return ReminderStatus::PermissionDenied;
        }
        let delay_minutes = minutes_until(now, at);
        let body = if habit.description.is_empty() {
            &habit.name
        } else {
            &habit.description
        };
        self.notifier.send(
            &format!("Reminder for {}!", habit.name),
            &format!("It's time for your habit: {body}"),
            delay_minutes,
        );
        tracing::debug!(habit_id = habit.id(), delay_minutes, "reminder scheduled");
        ReminderStatus::Scheduled { delay_minutes }
    }

    // ── Check-ins ────────────────────────────────────────────────────

    /// Check in for today (local date).
    pub fn check_in(&self, habit_id: &str) -> Result<CheckInProgress> {
        self.check_in_on(habit_id, Local::now().date_naive())
    }

    pub fn check_in_on(&self, habit_id: &str, today: NaiveDate) -> Result<CheckInProgress> {
        let progress =
            self.mutate(|| self.db.upsert_daily_check_in(habit_id, self.user.user_id(), today))?;
        tracing::info!(
            habit_id,
            count = progress.check_in.daily_completion_count,
            times = progress.times_per_day,
            "checked in"
        );
        Ok(progress)
    }

    /// Undo one completion of `date`. A collected reward is revoked and its
    /// points are debited together with the undo.
    pub fn undo_check_in(&self, habit_id: &str, date: NaiveDate) -> Result<UndoOutcome> {
        let outcome = self.mutate(|| {
            self.db
                .undo_last_check_in(habit_id, date, self.user.user_id())
        })?;
        if outcome.reward_revoked {
            tracing::info!(habit_id, points = outcome.points_debited, "reward revoked");
        }
        Ok(outcome)
    }

    /// Collect the reward for a fully completed day and credit its points.
    pub fn collect_reward(&self, habit_id: &str, date: NaiveDate) -> Result<RewardReceipt> {
        self.mutate(|| {
            let id = CheckInId::new(habit_id, date);
            let (check_in, habit, balance) = self
                .db
                .collect_reward(&id, self.user.user_id())
                .map_err(|e| match e {
                    CoreError::NotFound { entity: "check-in", .. } => CoreError::precondition(
                        format!("No check-in for '{habit_id}' on {date}"),
                    ),
                    other => other,
                })?;
            Ok(RewardReceipt {
                check_in,
                points: habit.reward_points(),
                balance,
            })
        })
    }

    pub fn check_ins(&self, habit_id: &str) -> Result<Vec<CheckIn>> {
        self.db.check_ins_for_habit(habit_id, self.user.user_id())
    }

    pub fn streak(&self, habit_id: &str, today: NaiveDate) -> Result<StreakSummary> {
        self.habit(habit_id)?;
        Ok(calculate_streak(&self.check_ins(habit_id)?, today))
    }

    pub fn list_with_progress(&self, today: NaiveDate) -> Result<Vec<HabitProgress>> {
        self.habits()?
            .into_iter()
            .map(|habit| {
                let check_ins = self.check_ins(habit.id())?;
                let todays = check_ins.iter().find(|c| c.date == today);
                Ok(HabitProgress {
                    today_count: todays.map_or(0, |c| c.daily_completion_count),
                    reward_collected_today: todays.is_some_and(|c| c.reward_collected),
                    streak: calculate_streak(&check_ins, today),
                    due_today: habit.is_due_on(today),
                    period_description: habit.period.describe(),
                    check_ins,
                    habit,
                })
            })
            .collect()
    }

    pub fn balance(&self) -> Result<u32> {
        self.ledger.balance(self.user.user_id())
    }
}

impl HabitCheckIn for HabitService {
    fn habit_name(&self, habit_id: &str) -> Option<String> {
        self.habit(habit_id).ok().map(|h| h.name)
    }

    fn check_in(&self, habit_id: &str) -> Result<CheckInProgress> {
        HabitService::check_in(self, habit_id)
    }
}

/// Whole minutes from `now` until the next `at` (today if not yet passed,
/// otherwise tomorrow), rounded to the nearest minute.
pub fn minutes_until(now: NaiveDateTime, at: NaiveTime) -> u32 {
    let mut target = now.date().and_time(at);
    if target < now {
        target += chrono::Duration::days(1);
    }
    let secs = (target - now).num_seconds();
    ((secs + 30) / 60) as u32
}
