//! Environment capabilities the focus session talks to.
//!
//! Implementations live in the host (the CLI ships terminal versions). Every
//! method is allowed to fail or be unsupported; the session degrades instead
//! of stopping.

use crate::error::Result;
use crate::storage::CheckInProgress;

/// Local notifications.
pub trait Notifier: Send + Sync {
    /// Ask for permission to notify. `false` means denied or unsupported.
    fn request_permission(&self) -> bool;

    /// Fire-and-forget. `delay_minutes == 0` delivers immediately.
    fn send(&self, title: &str, body: &str, delay_minutes: u32);
}

/// Exclusive ("fullscreen") display mode.
pub trait ExclusiveDisplay: Send + Sync {
    /// Enter exclusive display. Already being in it counts as success.
    fn request(&self) -> Result<()>;

    /// Leave exclusive display. No-op when not in it.
    fn exit(&self) -> Result<()>;

    fn is_active(&self) -> bool;
}

/// Habit check-in used when a linked focus session completes.
pub trait HabitCheckIn: Send + Sync {
    /// Display name of the habit, if it exists for the current user.
    fn habit_name(&self, habit_id: &str) -> Option<String>;

    fn check_in(&self, habit_id: &str) -> Result<CheckInProgress>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_permission(&self) -> bool {
        true
    }

    fn send(&self, title: &str, body: &str, delay_minutes: u32) {
        tracing::info!(delay_minutes, "notification: {title}: {body}");
    }
}

/// Display for hosts without an exclusive mode. Every request is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExclusiveDisplay;

impl ExclusiveDisplay for NoExclusiveDisplay {
    fn request(&self) -> Result<()> {
        Err(crate::error::CoreError::CapabilityDenied {
            capability: crate::error::Capability::ExclusiveDisplay,
            reason: "not supported by this host".into(),
        })
    }

    fn exit(&self) -> Result<()> {
        Ok(())
    }

    fn is_active(&self) -> bool {
        false
    }
}
