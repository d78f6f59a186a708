use serde::Serialize;

use crate::focus::{Phase, Prompt};
use crate::timer::SessionType;

/// Why points were deducted during a focus run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PenaltyReason {
    LeftExclusiveDisplay,
    TabHidden,
    ContinuedWithoutExclusiveDisplay,
    DidNotReturnAfterBreak,
}

/// Every state change the render layer cares about.
/// The focus session queues them; the driver broadcasts them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FocusEvent {
    SessionStarted {
        session_type: SessionType,
        duration_secs: u64,
    },
    SessionCompleted {
        session_type: SessionType,
        /// Set for focus sessions only.
        points_awarded: Option<u32>,
    },
    PenaltyApplied {
        points: u32,
        reason: PenaltyReason,
    },
    /// A manual break was taken during a focus session.
    InterruptionRecorded {
        breaks_taken: u32,
    },
    PromptShown {
        prompt: Prompt,
    },
    PromptResolved {
        prompt: Prompt,
    },
    /// Break ended while the user was away; they have `secs` to return.
    GraceWindowStarted {
        secs: u64,
    },
    BreakEndingSoon {
        session_type: SessionType,
        secs: u64,
    },
    HabitCheckIn {
        habit_id: String,
        success: bool,
    },
    /// A capability was unavailable; the flow continued without it.
    Hint {
        message: String,
    },
    Reset,
}

/// What the render layer reads after every input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub phase: Phase,
    pub session_type: SessionType,
    pub time_left_secs: u64,
    pub is_running: bool,
    pub pomodoro_count: u32,
    pub total_sessions: u32,
    pub breaks_taken: u32,
    pub selected_habit_id: Option<String>,
    pub prompt: Option<Prompt>,
    pub break_cooldown_active: bool,
    pub hint: Option<String>,
}

impl FocusSnapshot {
    pub fn show_setup(&self) -> bool {
        self.phase == Phase::Setup
    }

    /// `MM:SS` of the remaining time.
    pub fn clock_text(&self) -> String {
        format!("{:02}:{:02}", self.time_left_secs / 60, self.time_left_secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged_camel_case() {
        let json = serde_json::to_value(FocusEvent::PenaltyApplied {
            points: 20,
            reason: PenaltyReason::TabHidden,
        })
        .unwrap();
        assert_eq!(json["type"], "penaltyApplied");
        assert_eq!(json["points"], 20);
        assert_eq!(json["reason"], "tabHidden");

        let json = serde_json::to_value(FocusEvent::SessionStarted {
            session_type: SessionType::LongBreak,
            duration_secs: 900,
        })
        .unwrap();
        assert_eq!(json["sessionType"], "longBreak");
        assert_eq!(json["durationSecs"], 900);
    }

    #[test]
    fn clock_text_pads() {
        let snap = FocusSnapshot {
            phase: Phase::FocusRunning,
            session_type: SessionType::Focus,
            time_left_secs: 65,
            is_running: true,
            pomodoro_count: 0,
            total_sessions: 1,
            breaks_taken: 0,
            selected_habit_id: None,
            prompt: None,
            break_cooldown_active: false,
            hint: None,
        };
        assert_eq!(snap.clock_text(), "01:05");
        assert!(!snap.show_setup());
    }
}
