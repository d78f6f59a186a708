//! Exclusive-display requests with self-transition tracking.
//!
//! Asking the environment to enter or leave exclusive display makes it emit
//! display (and sometimes visibility) change notifications of its own. The
//! enforcer records a pending self-transition before calling out. Display
//! change notifications that arrive while it is pending, or within the settle
//! window after it, belong to the request and are not user actions. Once the
//! transition settles the caller re-reads the real display state, so a user
//! exit that landed inside the window is still seen.

use std::sync::Arc;

use super::collaborators::ExclusiveDisplay;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enter,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTransition {
    pub token: u64,
    pub direction: Direction,
    /// Machine clock time after which the transition is settled.
    settles_at_ms: u64,
}

pub struct PresenceEnforcer {
    display: Arc<dyn ExclusiveDisplay>,
    settle_window_ms: u64,
    pending: Option<SelfTransition>,
    next_token: u64,
}

impl PresenceEnforcer {
    pub fn new(display: Arc<dyn ExclusiveDisplay>, settle_window_ms: u64) -> Self {
        Self {
            display,
            settle_window_ms,
            pending: None,
            next_token: 1,
        }
    }

    /// Enter exclusive display. Already being in it counts as success.
    pub fn request_exclusive(&mut self, now_ms: u64) -> Result<()> {
        if self.display.is_active() {
            return Ok(());
        }
        self.begin(Direction::Enter, now_ms);
        self.display.request()
    }

    /// Leave exclusive display if it is active.
    pub fn release(&mut self, now_ms: u64) {
        if !self.display.is_active() {
            return;
        }
        self.begin(Direction::Exit, now_ms);
        if let Err(e) = self.display.exit() {
            tracing::warn!("failed to leave exclusive display: {e}");
        }
    }

    pub fn is_active(&self) -> bool {
        self.display.is_active()
    }

    /// True while a self-triggered transition has not settled.
    pub fn attempt_in_progress(&self, now_ms: u64) -> bool {
        self.pending
            .is_some_and(|p| now_ms <= p.settles_at_ms)
    }

    pub fn pending(&self) -> Option<SelfTransition> {
        self.pending
    }

    /// Drop the pending transition once its settle window has passed and
    /// return it.
    pub fn settle(&mut self, now_ms: u64) -> Option<SelfTransition> {
        let p = self.pending.filter(|p| now_ms > p.settles_at_ms)?;
        tracing::trace!(token = p.token, "display transition settled");
        self.pending = None;
        Some(p)
    }

    fn begin(&mut self, direction: Direction, now_ms: u64) {
        let token = self.next_token;
        self.next_token += 1;
        self.pending = Some(SelfTransition {
            token,
            direction,
            settles_at_ms: now_ms + self.settle_window_ms,
        });
    }
}
