//! Repeat rules deciding on which days a habit is due.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const WEEKDAY_SHORT: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum Period {
    /// Weekdays, 0 = Sunday.
    #[serde(rename_all = "camelCase")]
    Daily { selected_days_of_week: BTreeSet<u8> },
    /// Days of the month, 1..=31.
    #[serde(rename_all = "camelCase")]
    Monthly { selected_days_of_month: BTreeSet<u8> },
    /// Every N days counted from the habit's creation day.
    #[serde(rename_all = "camelCase")]
    Interval { interval_days: u32 },
}

impl Period {
    pub fn every_day() -> Self {
        Period::Daily {
            selected_days_of_week: (0..7).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Period::Daily {
                selected_days_of_week,
            } => check_set("selectedDaysOfWeek", selected_days_of_week, 0, 6),
            Period::Monthly {
                selected_days_of_month,
            } => check_set("selectedDaysOfMonth", selected_days_of_month, 1, 31),
            Period::Interval { interval_days } => {
                if *interval_days < 1 {
                    return Err(ValidationError::OutOfRange {
                        field: "intervalDays",
                        value: i64::from(*interval_days),
                        min: 1,
                        max: i64::from(u32::MAX),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn is_due_on(&self, date: NaiveDate, created_on: NaiveDate) -> bool {
        match self {
            Period::Daily {
                selected_days_of_week,
            } => {
                let weekday = date.weekday().num_days_from_sunday() as u8;
                selected_days_of_week.contains(&weekday)
            }
            Period::Monthly {
                selected_days_of_month,
            } => selected_days_of_month.contains(&(date.day() as u8)),
            Period::Interval { interval_days } => {
                let days = (date - created_on).num_days();
                days >= 0 && *interval_days > 0 && days % i64::from(*interval_days) == 0
            }
        }
    }

    /// Short human description, e.g. "Every Mon, Wed".
    pub fn describe(&self) -> String {
        match self {
            Period::Daily {
                selected_days_of_week,
            } => {
                if selected_days_of_week.is_empty() {
                    return "Daily (unspecified days)".to_string();
                }
                if selected_days_of_week.len() == 7 {
                    return "Everyday".to_string();
                }
                let days: Vec<&str> = selected_days_of_week
                    .iter()
                    .filter_map(|d| WEEKDAY_SHORT.get(*d as usize).copied())
                    .collect();
                format!("Every {}", days.join(", "))
            }
            Period::Monthly {
                selected_days_of_month,
            } => {
                if selected_days_of_month.is_empty() {
                    return "Monthly (unspecified days)".to_string();
                }
                let days: Vec<String> = selected_days_of_month
                    .iter()
                    .map(|d| ordinal(u32::from(*d)))
                    .collect();
                format!("On {} of month", days.join(", "))
            }
            Period::Interval { interval_days } => format!("Every {interval_days} day(s)"),
        }
    }
}

fn check_set(
    field: &'static str,
    set: &BTreeSet<u8>,
    min: u8,
    max: u8,
) -> Result<(), ValidationError> {
    if set.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if let Some(bad) = set.iter().find(|d| **d < min || **d > max) {
        return Err(ValidationError::OutOfRange {
            field,
            value: i64::from(*bad),
            min: i64::from(min),
            max: i64::from(max),
        });
    }
    Ok(())
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_uses_sunday_zero() {
        // 2024-01-07 is a Sunday.
        let period = Period::Daily {
            selected_days_of_week: [0, 3].into_iter().collect(),
        };
        let created = date(2024, 1, 1);
        assert!(period.is_due_on(date(2024, 1, 7), created));
        assert!(period.is_due_on(date(2024, 1, 10), created));
        assert!(!period.is_due_on(date(2024, 1, 8), created));
    }

    #[test]
    fn monthly_matches_day_of_month() {
        let period = Period::Monthly {
            selected_days_of_month: [1, 15].into_iter().collect(),
        };
        let created = date(2024, 1, 1);
        assert!(period.is_due_on(date(2024, 3, 15), created));
        assert!(!period.is_due_on(date(2024, 3, 16), created));
    }

    #[test]
    fn interval_counts_from_creation() {
        let period = Period::Interval { interval_days: 3 };
        let created = date(2024, 1, 1);
        assert!(period.is_due_on(created, created));
        assert!(!period.is_due_on(date(2024, 1, 2), created));
        assert!(period.is_due_on(date(2024, 1, 4), created));
        assert!(!period.is_due_on(date(2023, 12, 29), created));
    }

    #[test]
    fn descriptions() {
        assert_eq!(Period::every_day().describe(), "Everyday");
        let weekdays = Period::Daily {
            selected_days_of_week: [3, 1].into_iter().collect(),
        };
        assert_eq!(weekdays.describe(), "Every Mon, Wed");
        let monthly = Period::Monthly {
            selected_days_of_month: [1, 2, 3, 11, 22].into_iter().collect(),
        };
        assert_eq!(monthly.describe(), "On 1st, 2nd, 3rd, 11th, 22nd of month");
        assert_eq!(
            Period::Interval { interval_days: 2 }.describe(),
            "Every 2 day(s)"
        );
    }

    #[test]
    fn validation_rejects_bad_sets() {
        let empty = Period::Daily {
            selected_days_of_week: BTreeSet::new(),
        };
        assert!(empty.validate().is_err());
        let out_of_range = Period::Monthly {
            selected_days_of_month: [0].into_iter().collect(),
        };
        assert!(out_of_range.validate().is_err());
        assert!(Period::Interval { interval_days: 0 }.validate().is_err());
        assert!(Period::every_day().validate().is_ok());
    }

    #[test]
    fn json_shape_is_tagged() {
        let json = serde_json::to_value(Period::Interval { interval_days: 2 }).unwrap();
        assert_eq!(json["type"], "interval");
        assert_eq!(json["config"]["intervalDays"], 2);
    }
}
