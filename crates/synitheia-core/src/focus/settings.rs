use serde::{Deserialize, Serialize};

use crate::storage::Config;
use crate::timer::{minutes_to_secs, SessionDurations, SessionType};

/// Tunables of a focus session, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSettings {
    pub durations: SessionDurations,
    pub long_break_every: u32,
    pub total_sessions: u32,
    pub session_reward_points: u32,
    pub interruption_cost_points: u32,
    pub violation_penalty_points: u32,
    pub grace_window_secs: u64,
    pub break_start_delay_secs: u64,
    pub continue_delay_secs: u64,
    pub break_warning_secs: u64,
    pub settle_window_ms: u64,
    pub notifications_enabled: bool,
}

impl FocusSettings {
    /// Points paid for a completed focus session after `interruptions`.
    pub fn payout(&self, interruptions: u32) -> u32 {
        self.session_reward_points
            .saturating_sub(self.interruption_cost_points.saturating_mul(interruptions))
    }

    pub fn break_after(&self, completed_focus: u32) -> SessionType {
        SessionType::break_after(completed_focus, self.long_break_every)
    }

    /// Set a session length in minutes, clamped to at least one minute.
    pub fn set_minutes(&mut self, session: SessionType, minutes: u32) -> u64 {
        let secs = minutes_to_secs(minutes);
        self.durations.set(session, secs);
        secs
    }
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for FocusSettings {
    fn from(config: &Config) -> Self {
        let focus = &config.focus;
        let rules = &config.rules;
        Self {
            durations: SessionDurations::from_minutes(
                focus.focus_minutes,
                focus.short_break_minutes,
                focus.long_break_minutes,
            ),
            long_break_every: focus.long_break_every.max(1),
            total_sessions: focus.total_sessions.max(1),
            session_reward_points: rules.session_reward_points,
            interruption_cost_points: rules.interruption_cost_points,
            violation_penalty_points: rules.violation_penalty_points,
            grace_window_secs: rules.grace_window_secs,
            break_start_delay_secs: rules.break_start_delay_secs,
            continue_delay_secs: rules.continue_delay_secs,
            break_warning_secs: rules.break_warning_secs,
            settle_window_ms: rules.settle_window_ms,
            notifications_enabled: config.notifications.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_follow_config() {
        let settings = FocusSettings::default();
        assert_eq!(settings.durations.focus_secs, 25 * 60);
        assert_eq!(settings.durations.long_break_secs, 15 * 60);
        assert_eq!(settings.total_sessions, 1);
        assert_eq!(settings.grace_window_secs, 10);
    }

    #[test]
    fn two_interruptions_pay_ten() {
        assert_eq!(FocusSettings::default().payout(2), 10);
    }

    #[test]
    fn zero_values_in_config_are_clamped() {
        let mut config = Config::default();
        config.focus.focus_minutes = 0;
        config.focus.total_sessions = 0;
        config.focus.long_break_every = 0;
        let settings = FocusSettings::from(&config);
        assert_eq!(settings.durations.focus_secs, 60);
        assert_eq!(settings.total_sessions, 1);
        assert_eq!(settings.long_break_every, 1);
    }

    proptest! {
        #[test]
        fn payout_never_exceeds_reward(breaks in 0u32..10_000) {
            let settings = FocusSettings::default();
            let paid = settings.payout(breaks);
            prop_assert!(paid <= 20);
            prop_assert_eq!(paid, 20u32.saturating_sub(5 * breaks));
        }
    }
}
