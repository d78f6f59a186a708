//! Habit, check-in and point-balance operations.
//!
//! Every operation is scoped by owner. A record that belongs to another
//! user is reported as not found and logged; it is never touched.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use super::database::Database;
use crate::error::{CoreError, Result, ValidationError};
use crate::habit::{CheckIn, CheckInId, Difficulty, Habit, HabitDraft, HabitType, Period};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const HABIT_COLUMNS: &str = "id, owner_id, name, description, habit_type, times_per_day,
     difficulty, period, label, reminder_time, time_taken_minutes, created_at";

/// Result of a successful check-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInProgress {
    pub check_in: CheckIn,
    pub times_per_day: u32,
}

impl CheckInProgress {
    pub fn fully_completed(&self) -> bool {
        self.check_in.is_fully_completed(self.times_per_day)
    }
}

/// Result of a successful undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    pub remaining_count: u32,
    /// The record reached zero and was deleted.
    pub removed: bool,
    /// `reward_collected` was true before and has been cleared.
    pub reward_revoked: bool,
    /// Reward points taken back from the owner's balance.
    pub points_debited: u32,
}

// === Helper Functions ===

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn invalid(field: &str, value: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: format!("unrecognised stored value '{value}'"),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

/// Build a Habit from a row selected with `HABIT_COLUMNS`.
fn row_to_habit(row: &rusqlite::Row) -> rusqlite::Result<Habit> {
    let habit_type: String = row.get(4)?;
    let difficulty: String = row.get(6)?;
    let period: String = row.get(7)?;
    let reminder: Option<String> = row.get(9)?;
    let created_at: String = row.get(11)?;

    let draft = HabitDraft {
        name: row.get(2)?,
        description: row.get(3)?,
        habit_type: HabitType::parse(&habit_type)
            .ok_or_else(|| conversion_error(4, invalid("habit_type", &habit_type)))?,
        times_per_day: row.get(5)?,
        difficulty: Difficulty::parse(&difficulty)
            .ok_or_else(|| conversion_error(6, invalid("difficulty", &difficulty)))?,
        period: serde_json::from_str::<Period>(&period).map_err(|e| conversion_error(7, e))?,
        label: row.get(8)?,
        reminder_time: reminder
            .map(|s| NaiveTime::parse_from_str(&s, TIME_FORMAT))
            .transpose()
            .map_err(|e| conversion_error(9, e))?,
        time_taken_minutes: row.get(10)?,
    };
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(11, e))?;

    Ok(Habit::from_parts(row.get(0)?, row.get(1)?, draft, created_at))
}

fn row_to_check_in(row: &rusqlite::Row) -> rusqlite::Result<CheckIn> {
    let date: String = row.get(1)?;
    Ok(CheckIn {
        habit_id: row.get(0)?,
        date: parse_date(1, &date)?,
        owner_id: row.get(2)?,
        daily_completion_count: row.get(3)?,
        reward_collected: row.get(4)?,
    })
}

fn find_habit(conn: &Connection, id: &str) -> rusqlite::Result<Option<Habit>> {
    conn.query_row(
        &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
        params![id],
        row_to_habit,
    )
    .optional()
}

/// Look up a habit and check it belongs to `owner_id`.
fn owned_habit(conn: &Connection, id: &str, owner_id: &str) -> Result<Habit> {
    match find_habit(conn, id)? {
        Some(habit) if habit.owner_id() == owner_id => Ok(habit),
        Some(_) => {
            tracing::warn!(habit_id = id, owner_id, "habit belongs to another user");
            Err(CoreError::not_found("habit", id))
        }
        None => Err(CoreError::not_found("habit", id)),
    }
}

fn find_check_in(conn: &Connection, habit_id: &str, date: NaiveDate) -> rusqlite::Result<Option<CheckIn>> {
    conn.query_row(
        "SELECT habit_id, date, owner_id, daily_completion_count, reward_collected
         FROM checkins WHERE habit_id = ?1 AND date = ?2",
        params![habit_id, format_date(date)],
        row_to_check_in,
    )
    .optional()
}

fn owned_check_in(
    conn: &Connection,
    habit_id: &str,
    date: NaiveDate,
    owner_id: &str,
) -> Result<Option<CheckIn>> {
    match find_check_in(conn, habit_id, date)? {
        Some(c) if c.owner_id != owner_id => {
            tracing::warn!(habit_id, %date, owner_id, "check-in belongs to another user");
            Ok(None)
        }
        other => Ok(other),
    }
}

/// Balance update on an open transaction, floored at zero.
fn apply_delta(conn: &Connection, user_id: &str, delta: i64) -> rusqlite::Result<u32> {
    conn.execute(
        "INSERT OR IGNORE INTO user_data (user_id, total_reward_points) VALUES (?1, 0)",
        params![user_id],
    )?;
    let current: i64 = conn.query_row(
        "SELECT total_reward_points FROM user_data WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    let next = current.saturating_add(delta).clamp(0, i64::from(u32::MAX));
    conn.execute(
        "UPDATE user_data SET total_reward_points = ?2 WHERE user_id = ?1",
        params![user_id, next],
    )?;
    Ok(next as u32)
}

fn write_habit(conn: &Connection, habit: &Habit) -> Result<()> {
    let period = serde_json::to_string(&habit.period)?;
    conn.execute(
        "INSERT OR REPLACE INTO habits (id, owner_id, name, description, habit_type,
             times_per_day, difficulty, reward_points, period, label, reminder_time,
             time_taken_minutes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            habit.id(),
            habit.owner_id(),
            habit.name,
            habit.description,
            habit.habit_type.as_str(),
            habit.times_per_day,
            habit.difficulty.as_str(),
            habit.reward_points(),
            period,
            habit.label,
            habit.reminder_time.map(|t| t.format(TIME_FORMAT).to_string()),
            habit.time_taken_minutes,
            habit.created_at().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl Database {
    // ── Habits ───────────────────────────────────────────────────────

    /// Validate and store a new habit owned by `owner_id`.
    pub fn create_habit(&self, draft: HabitDraft, owner_id: &str) -> Result<Habit> {
        let habit = Habit::create(draft, owner_id, Utc::now())?;
        self.with_conn(|conn| write_habit(conn, &habit))?;
        tracing::debug!(habit_id = habit.id(), "habit created");
        Ok(habit)
    }

    /// All habits of `owner_id`, oldest first.
    pub fn list_habits(&self, owner_id: &str) -> Result<Vec<Habit>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HABIT_COLUMNS} FROM habits WHERE owner_id = ?1 ORDER BY created_at, id"
            ))?;
            let habits = stmt
                .query_map(params![owner_id], row_to_habit)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(habits)
        })
    }

    pub fn get_habit(&self, id: &str, owner_id: &str) -> Result<Habit> {
        self.with_conn(|conn| owned_habit(conn, id, owner_id))
    }

    /// Replace the editable fields of a habit. `id` and `created_at` are kept
    /// and reward points are re-derived from the difficulty.
    pub fn update_habit(&self, id: &str, draft: HabitDraft, owner_id: &str) -> Result<Habit> {
        self.with_conn(|conn| {
            let mut habit = owned_habit(conn, id, owner_id)?;
            habit.apply(draft)?;
            write_habit(conn, &habit)?;
            Ok(habit)
        })
    }

    /// Delete a habit and all of its check-ins. Returns the number of
    /// check-ins removed.
    pub fn delete_habit(&self, id: &str, owner_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            owned_habit(&tx, id, owner_id)?;
            let removed = tx.execute(
                "DELETE FROM checkins WHERE habit_id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            tx.execute("DELETE FROM habits WHERE id = ?1", params![id])?;
            tx.commit()?;
            tracing::debug!(habit_id = id, removed, "habit deleted");
            Ok(removed)
        })
    }

    // ── Check-ins ────────────────────────────────────────────────────

    /// Check-ins of one habit, oldest first. Records of other owners are skipped.
    pub fn check_ins_for_habit(&self, habit_id: &str, owner_id: &str) -> Result<Vec<CheckIn>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT habit_id, date, owner_id, daily_completion_count, reward_collected
                 FROM checkins WHERE habit_id = ?1 AND owner_id = ?2 ORDER BY date",
            )?;
            let rows = stmt
                .query_map(params![habit_id, owner_id], row_to_check_in)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// The check-in for one habit and day, if any.
    pub fn get_check_in(
        &self,
        habit_id: &str,
        date: NaiveDate,
        owner_id: &str,
    ) -> Result<Option<CheckIn>> {
        self.with_conn(|conn| owned_check_in(conn, habit_id, date, owner_id))
    }

    /// Count one more completion for `today`, creating the day's record on
    /// the first call. Refused once the day is fully completed.
    pub fn upsert_daily_check_in(
        &self,
        habit_id: &str,
        owner_id: &str,
        today: NaiveDate,
    ) -> Result<CheckInProgress> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let habit = owned_habit(&tx, habit_id, owner_id)?;
            let existing = find_check_in(&tx, habit_id, today)?;

            if let Some(ref c) = existing {
                if c.owner_id != owner_id {
                    tracing::warn!(habit_id, owner_id, "check-in belongs to another user");
                    return Err(CoreError::not_found("check-in", CheckInId::new(habit_id, today).to_string()));
                }
            }

            let count = existing.as_ref().map_or(0, |c| c.daily_completion_count);
            if count >= habit.times_per_day {
                return Err(CoreError::precondition(format!(
                    "Habit '{}' is already fully completed ({}/{}) for {}",
                    habit.name, habit.times_per_day, habit.times_per_day, today
                )));
            }

            let check_in = match existing {
                Some(mut c) => {
                    c.daily_completion_count += 1;
                    tx.execute(
                        "UPDATE checkins SET daily_completion_count = ?3, status = 'completed'
                         WHERE habit_id = ?1 AND date = ?2",
                        params![habit_id, format_date(today), c.daily_completion_count],
                    )?;
                    c
                }
                None => {
                    tx.execute(
                        "INSERT INTO checkins (habit_id, date, owner_id, daily_completion_count,
                             reward_collected, status)
                         VALUES (?1, ?2, ?3, 1, 0, 'completed')",
                        params![habit_id, format_date(today), owner_id],
                    )?;
                    CheckIn {
                        habit_id: habit_id.to_string(),
                        owner_id: owner_id.to_string(),
                        date: today,
                        daily_completion_count: 1,
                        reward_collected: false,
                    }
                }
            };
            tx.commit()?;

            Ok(CheckInProgress {
                check_in,
                times_per_day: habit.times_per_day,
            })
        })
    }

    /// Take back one completion. The record is deleted at zero, and the
    /// reward flag is cleared whenever the count drops below full completion.
    /// A cleared reward is debited from the owner's balance in the same
    /// transaction.
    pub fn undo_last_check_in(
        &self,
        habit_id: &str,
        date: NaiveDate,
        owner_id: &str,
    ) -> Result<UndoOutcome> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let habit = owned_habit(&tx, habit_id, owner_id)?;
            let Some(check_in) = owned_check_in(&tx, habit_id, date, owner_id)? else {
                tracing::warn!(habit_id, %date, "nothing to undo");
                return Err(CoreError::not_found(
                    "check-in",
                    CheckInId::new(habit_id, date).to_string(),
                ));
            };
            if check_in.daily_completion_count == 0 {
                return Err(CoreError::precondition(format!(
                    "No completions of '{}' to undo on {date}",
                    habit.name
                )));
            }

            let remaining = check_in.daily_completion_count - 1;
            let below_full = remaining < habit.times_per_day;
            let reward_revoked = check_in.reward_collected && below_full;

            if remaining == 0 {
                tx.execute(
                    "DELETE FROM checkins WHERE habit_id = ?1 AND date = ?2",
                    params![habit_id, format_date(date)],
                )?;
            } else {
                tx.execute(
                    "UPDATE checkins SET daily_completion_count = ?3,
                         reward_collected = CASE WHEN ?4 THEN 0 ELSE reward_collected END
                     WHERE habit_id = ?1 AND date = ?2",
                    params![habit_id, format_date(date), remaining, below_full],
                )?;
            }
            let points_debited = if reward_revoked {
                let points = habit.reward_points();
                apply_delta(&tx, owner_id, -i64::from(points))?;
                points
            } else {
                0
            };
            tx.commit()?;

            Ok(UndoOutcome {
                remaining_count: remaining,
                removed: remaining == 0,
                reward_revoked,
                points_debited,
            })
        })
    }

    /// Mark a fully completed day as collected and credit the habit's points
    /// in one transaction. Refused when the day is not fully completed or was
    /// already collected. Returns the new balance alongside.
    pub fn collect_reward(
        &self,
        id: &CheckInId,
        owner_id: &str,
    ) -> Result<(CheckIn, Habit, u32)> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let habit = owned_habit(&tx, &id.habit_id, owner_id)?;
            let Some(mut check_in) = owned_check_in(&tx, &id.habit_id, id.date, owner_id)? else {
                return Err(CoreError::not_found("check-in", id.to_string()));
            };
            if check_in.reward_collected {
                return Err(CoreError::precondition(format!(
                    "Reward for '{}' on {} already collected",
                    habit.name, id.date
                )));
            }
            if !check_in.is_fully_completed(habit.times_per_day) {
                return Err(CoreError::precondition(format!(
                    "Habit '{}' needs to be completed {} times before collecting ({}/{})",
                    habit.name,
                    habit.times_per_day,
                    check_in.daily_completion_count,
                    habit.times_per_day
                )));
            }
            tx.execute(
                "UPDATE checkins SET reward_collected = 1 WHERE habit_id = ?1 AND date = ?2",
                params![id.habit_id, format_date(id.date)],
            )?;
            let balance = apply_delta(&tx, owner_id, i64::from(habit.reward_points()))?;
            tx.commit()?;
            check_in.reward_collected = true;
            Ok((check_in, habit, balance))
        })
    }

    // ── Point balance ────────────────────────────────────────────────

    /// Current balance, creating the user's row on first access.
    pub fn point_balance(&self, user_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO user_data (user_id, total_reward_points) VALUES (?1, 0)",
                params![user_id],
            )?;
            let total: u32 = conn.query_row(
                "SELECT total_reward_points FROM user_data WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(total)
        })
    }

    /// Read-modify-write of the balance in one immediate transaction,
    /// floored at zero. Returns the new balance.
    pub(crate) fn apply_point_delta(&self, user_id: &str, delta: i64) -> Result<u32> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let balance = apply_delta(&tx, user_id, delta)?;
            tx.commit()?;
            Ok(balance)
        })
    }
}
