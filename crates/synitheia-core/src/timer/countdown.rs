//! Second-granularity countdown.
//!
//! The countdown does not own a thread. The caller invokes `tick()` once per
//! elapsed second; the focus driver does this from a tokio interval.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running)* -> Completed
//!   ^                                          |
//!   +--------------- reset ---------------------+
//! ```
//!
//! A gate (`set_gate`) suppresses ticks without touching the run state. The
//! focus session closes it while a prompt is on screen so no time elapses
//! behind a modal.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    /// Reached zero. Stays here until started or reset.
    Completed,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing happened (not running, or gated).
    Idle,
    /// One second elapsed.
    Elapsed { remaining_secs: u64 },
    /// Remaining time went from 1 to 0. Fired once per run.
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Countdown {
    state: TimerState,
    remaining_secs: u64,
    /// Duration used when re-arming from zero and by `reset(None)`.
    target_secs: u64,
    #[serde(default)]
    gated: bool,
}

impl Countdown {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            state: TimerState::Idle,
            remaining_secs: duration_secs,
            target_secs: duration_secs,
            gated: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn target_secs(&self) -> u64 {
        self.target_secs
    }

    pub fn is_gated(&self) -> bool {
        self.gated
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Resume from the current remaining time, re-arming to the target first
    /// when nothing is left. Returns false if already running.
    pub fn start(&mut self) -> bool {
        if self.state == TimerState::Running {
            return false;
        }
        if self.remaining_secs == 0 {
            self.remaining_secs = self.target_secs;
        }
        if self.remaining_secs == 0 {
            // Zero-length target: nothing to count.
            return false;
        }
        self.state = TimerState::Running;
        true
    }

    /// Stop decrementing, keeping the remaining time.
    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        true
    }

    /// Stop and set remaining time to `duration_secs`, or to the target.
    /// A given duration becomes the new target.
    pub fn reset(&mut self, duration_secs: Option<u64>) {
        if let Some(secs) = duration_secs {
            self.target_secs = secs;
        }
        self.remaining_secs = self.target_secs;
        self.state = TimerState::Idle;
    }

    /// Set remaining time directly. Run state is unchanged.
    pub fn set_duration(&mut self, secs: u64) {
        self.remaining_secs = secs;
        if self.state == TimerState::Completed && secs > 0 {
            self.state = TimerState::Idle;
        }
    }

    /// Change the re-arm target without touching remaining time.
    pub fn retarget(&mut self, secs: u64) {
        self.target_secs = secs;
    }

    /// Open (`false`) or close (`true`) the tick gate.
    pub fn set_gate(&mut self, closed: bool) {
        self.gated = closed;
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running || self.gated {
            return Tick::Idle;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.state = TimerState::Completed;
            return Tick::Completed;
        }
        Tick::Elapsed {
            remaining_secs: self.remaining_secs,
        }
    }
}
