use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionType {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn is_break(self) -> bool {
        !matches!(self, SessionType::Focus)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }

    /// The break that follows the `completed_focus`-th focus session.
    pub fn break_after(completed_focus: u32, long_break_every: u32) -> Self {
        if long_break_every > 0 && completed_focus > 0 && completed_focus % long_break_every == 0 {
            SessionType::LongBreak
        } else {
            SessionType::ShortBreak
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Lengths of the three session types, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDurations {
    pub focus_secs: u64,
    pub short_break_secs: u64,
    pub long_break_secs: u64,
}

impl SessionDurations {
    pub fn from_minutes(focus: u32, short_break: u32, long_break: u32) -> Self {
        Self {
            focus_secs: minutes_to_secs(focus),
            short_break_secs: minutes_to_secs(short_break),
            long_break_secs: minutes_to_secs(long_break),
        }
    }

    pub fn for_session(&self, session: SessionType) -> u64 {
        match session {
            SessionType::Focus => self.focus_secs,
            SessionType::ShortBreak => self.short_break_secs,
            SessionType::LongBreak => self.long_break_secs,
        }
    }

    pub fn set(&mut self, session: SessionType, secs: u64) {
        match session {
            SessionType::Focus => self.focus_secs = secs,
            SessionType::ShortBreak => self.short_break_secs = secs,
            SessionType::LongBreak => self.long_break_secs = secs,
        }
    }
}

impl Default for SessionDurations {
    fn default() -> Self {
        Self::from_minutes(25, 5, 15)
    }
}

/// Minutes to seconds, clamped to at least one minute.
pub fn minutes_to_secs(minutes: u32) -> u64 {
    u64::from(minutes.max(1)) * 60
}
