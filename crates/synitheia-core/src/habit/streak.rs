//! Streaks over a habit's check-in history.
//!
//! A day counts only when its reward was collected. Mere completion does not
//! extend a streak.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::model::CheckIn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    /// Consecutive qualifying days ending today. Zero when today does not
    /// qualify, even if yesterday did.
    pub current_streak: u32,
    /// Longest run of consecutive qualifying days anywhere in history.
    pub longest_streak: u32,
}

pub fn calculate_streak(check_ins: &[CheckIn], today: NaiveDate) -> StreakSummary {
    let qualifying: BTreeSet<NaiveDate> = check_ins
        .iter()
        .filter(|c| c.reward_collected)
        .map(|c| c.date)
        .collect();

    if qualifying.is_empty() {
        return StreakSummary::default();
    }

    let mut current = 0u32;
    let mut day = today;
    while qualifying.contains(&day) {
        current += 1;
        day -= Duration::days(1);
    }

    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for date in &qualifying {
        run = match previous {
            Some(prev) if (*date - prev).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*date);
    }

    StreakSummary {
        current_streak: current,
        longest_streak: longest.max(current),
    }
}
